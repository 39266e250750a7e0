use downtime_game::GradeIncreased;
use yew::prelude::*;

use super::modal::Modal;

#[derive(Properties, PartialEq, Clone)]
pub struct Props {
    pub notice: Option<GradeIncreased>,
    pub on_dismiss: Callback<()>,
}

/// Shows a grade or rank increase until dismissed.
#[function_component(GradeNotice)]
pub fn grade_notice(p: &Props) -> Html {
    let Some(notice) = p.notice.as_ref() else {
        return html! { <Modal open={false} title="" on_close={p.on_dismiss.clone()} /> };
    };
    let title = if notice.grade.is_empty() {
        format!("Rank {}", notice.rank)
    } else {
        notice.grade.clone()
    };
    html! {
        <Modal open={true} title={title} on_close={p.on_dismiss.clone()}>
            <p class="grade-notice__message">{ notice.message.clone() }</p>
            <p class="grade-notice__rank">{ format!("{} now uses rank {}", notice.competency, notice.rank) }</p>
        </Modal>
    }
}
