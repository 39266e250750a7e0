pub mod attempt_log;
pub mod attempt_panel;
pub mod button;
pub mod grade_notice;
pub mod modal;
pub mod progress_meter;
