use downtime_game::AttemptRecord;
use std::rc::Rc;
use yew::prelude::*;

#[derive(Properties, PartialEq, Clone)]
pub struct Props {
    /// Newest first.
    pub records: Rc<Vec<AttemptRecord>>,
    #[prop_or(10)]
    pub limit: usize,
}

fn describe(record: &AttemptRecord) -> String {
    let outcome = if record.success { "success" } else { "failure" };
    format!(
        "d20 {} {:+} = {} vs DC {}: {outcome}",
        record.roll, record.modifier, record.total, record.dc
    )
}

#[function_component(AttemptLog)]
pub fn attempt_log(p: &Props) -> Html {
    if p.records.is_empty() {
        return html! { <p class="attempt-log attempt-log--empty">{ "No attempts yet." }</p> };
    }
    html! {
        <ol class="attempt-log">
            { for p.records.iter().take(p.limit).map(|record| {
                let class = classes!(
                    "attempt-log__row",
                    if record.success { "attempt-log__row--success" } else { "attempt-log__row--failure" }
                );
                html! {
                    <li {class}>
                        <span class="attempt-log__roll">{ describe(record) }</span>
                        if record.gold_spent > 0 {
                            <span class="attempt-log__cost">{ format!("-{} gp", record.gold_spent) }</span>
                        }
                        if record.delta > 0 {
                            <span class="attempt-log__gain">{ format!("+{}", record.delta) }</span>
                        }
                    </li>
                }
            }) }
        </ol>
    }
}
