use downtime_game::GoalKind;
use yew::prelude::*;

#[derive(Properties, PartialEq, Clone)]
pub struct Props {
    pub accumulated: u32,
    pub required: u32,
    pub goal: GoalKind,
    pub percent: f64,
    #[prop_or_default]
    pub completed: bool,
}

fn unit_label(goal: GoalKind) -> &'static str {
    match goal {
        GoalKind::Gold => "gp",
        GoalKind::Successes => "successes",
    }
}

#[function_component(ProgressMeter)]
pub fn progress_meter(p: &Props) -> Html {
    let percent = p.percent.clamp(0.0, 100.0);
    let caption = format!(
        "{} / {} {} ({percent:.0}%)",
        p.accumulated,
        p.required,
        unit_label(p.goal)
    );
    html! {
        <div class={classes!("progress-meter", p.completed.then_some("progress-meter--done"))}>
            <progress max="100" value={format!("{percent:.1}")} aria-label="Progress"></progress>
            <span class="progress-meter__caption">{ caption }</span>
            if p.completed {
                <span class="progress-meter__badge">{ "Completed" }</span>
            }
        </div>
    }
}
