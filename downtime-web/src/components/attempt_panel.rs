use downtime_game::{
    Activity, ActivityKind, ActivityOrchestrator, AttemptError, AttemptOptions, AttemptPreview,
    CharacterId, PendingAttempt, Progress, SnapshotKey,
};
use std::cell::RefCell;
use std::rc::Rc;
use web_sys::HtmlInputElement;
use yew::prelude::*;

use super::attempt_log::AttemptLog;
use super::button::Button;
use super::progress_meter::ProgressMeter;

#[derive(Properties, Clone)]
pub struct Props {
    pub activity: Rc<Activity>,
    pub character: CharacterId,
    pub orchestrator: Rc<RefCell<ActivityOrchestrator>>,
    /// Bumped by the owner whenever any cached snapshot changes.
    pub revision: u32,
    #[prop_or_default]
    pub token: Option<AttrValue>,
    #[prop_or_default]
    pub on_changed: Callback<()>,
}

impl PartialEq for Props {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.activity, &other.activity)
            && Rc::ptr_eq(&self.orchestrator, &other.orchestrator)
            && self.character == other.character
            && self.revision == other.revision
            && self.token == other.token
    }
}

/// Handles a running attempt needs once the request settles.
#[derive(Clone)]
#[cfg_attr(not(target_arch = "wasm32"), allow(dead_code))]
struct Dispatch {
    activity: Rc<Activity>,
    orchestrator: Rc<RefCell<ActivityOrchestrator>>,
    token: Option<AttrValue>,
    working: UseStateHandle<bool>,
    error: UseStateHandle<Option<String>>,
    status: UseStateHandle<Option<String>>,
    mounted: Rc<RefCell<bool>>,
    on_changed: Callback<()>,
}

#[cfg(target_arch = "wasm32")]
impl Dispatch {
    fn settle(&self, finished: Result<downtime_game::AttemptOutcome, AttemptError>) {
        self.working.set(false);
        match finished {
            Ok(outcome) => {
                self.error.set(None);
                self.status.set(Some(outcome_summary(&outcome)));
            }
            Err(err) => {
                crate::dom::console_error(&format!("attempt failed: {err}"));
                self.error.set(Some(err.to_string()));
            }
        }
        self.on_changed.emit(());
    }
}

#[cfg(target_arch = "wasm32")]
fn dispatch(ctx: Dispatch, pending: PendingAttempt) {
    use downtime_game::AttemptTransport;

    wasm_bindgen_futures::spawn_local(async move {
        let transport =
            crate::api::FetchTransport::new(ctx.token.as_ref().map(ToString::to_string));
        let result = transport.send_attempt(pending.kind, &pending.request).await;
        if !*ctx.mounted.borrow() {
            ctx.orchestrator.borrow_mut().abandon(pending);
            return;
        }
        let finished = ctx
            .orchestrator
            .borrow_mut()
            .finish(&ctx.activity, pending, result);
        ctx.settle(finished);
    });
}

#[cfg(not(target_arch = "wasm32"))]
fn dispatch(ctx: Dispatch, pending: PendingAttempt) {
    log::debug!(
        "no browser transport; releasing attempt on activity {}",
        pending.request.activity_id
    );
    ctx.orchestrator.borrow_mut().abandon(pending);
    ctx.working.set(false);
}

#[cfg(target_arch = "wasm32")]
fn outcome_summary(outcome: &downtime_game::AttemptOutcome) -> String {
    let record = &outcome.record;
    let verdict = if record.success { "success" } else { "failure" };
    let mut summary = format!(
        "Rolled {} {:+} = {} vs DC {}: {verdict}.",
        record.roll, record.modifier, record.total, record.dc
    );
    if outcome.completed {
        summary.push_str(" Activity completed.");
    }
    if let Some(recipe) = &outcome.unlocked_recipe {
        summary.push_str(&format!(" Unlocked {recipe}."));
    }
    summary
}

fn cost_line(preview: &AttemptPreview) -> String {
    let days = preview.attempt_cost.days;
    let day_word = if days == 1 { "day" } else { "days" };
    format!(
        "Rank {}: {} gp and {days} {day_word}",
        preview.cost.rank, preview.attempt_cost.gold
    )
}

fn modifier_line(preview: &AttemptPreview) -> String {
    let breakdown = &preview.modifier;
    let mut line = format!(
        "{} {:+}",
        breakdown.ability.short_label(),
        breakdown.ability_modifier
    );
    if breakdown.proficient {
        line.push_str(&format!(", proficiency {:+}", breakdown.proficiency_bonus));
    }
    format!("{line} = {:+} vs DC {}", breakdown.total(), preview.dc)
}

fn parse_number<T: std::str::FromStr>(e: &InputEvent) -> Option<T> {
    let value = e.target_unchecked_into::<HtmlInputElement>().value();
    value.trim().parse().ok()
}

/// Any integer the player typed, saturated into `i32` so the range check
/// can report it instead of the field silently clearing.
fn typed_roll(text: &str) -> Option<i32> {
    let value: i64 = text.trim().parse().ok()?;
    Some(i32::try_from(value).unwrap_or(if value < 0 { i32::MIN } else { i32::MAX }))
}

#[function_component(AttemptPanel)]
#[allow(clippy::too_many_lines)]
pub fn attempt_panel(props: &Props) -> Html {
    let options = use_state(AttemptOptions::default);
    let working = use_state(|| false);
    let error = use_state(|| None::<String>);
    let status = use_state(|| None::<String>);
    let mounted = use_mut_ref(|| true);

    {
        let mounted = mounted.clone();
        use_effect_with((), move |()| {
            *mounted.borrow_mut() = true;
            move || *mounted.borrow_mut() = false
        });
    }

    let activity = props.activity.clone();
    let key = SnapshotKey::new(props.character, activity.id);
    let (preview, progress, can_retry) = {
        let orchestrator = props.orchestrator.borrow();
        (
            orchestrator.preview(&activity, props.character, *options),
            orchestrator.cache().progress(key).cloned(),
            orchestrator.can_retry(key),
        )
    };

    let ctx = Dispatch {
        activity: activity.clone(),
        orchestrator: props.orchestrator.clone(),
        token: props.token.clone(),
        working: working.clone(),
        error: error.clone(),
        status: status.clone(),
        mounted,
        on_changed: props.on_changed.clone(),
    };

    let start = |begun: Result<PendingAttempt, AttemptError>, ctx: Dispatch| {
        match begun {
            Ok(pending) => {
                ctx.working.set(true);
                ctx.error.set(None);
                log::debug!("attempt dispatched for activity {}", pending.request.activity_id);
                dispatch(ctx, pending);
            }
            Err(err) => ctx.error.set(Some(err.to_string())),
        }
    };

    let on_attempt = {
        let ctx = ctx.clone();
        let options = options.clone();
        let character = props.character;
        Callback::from(move |_: MouseEvent| {
            if *ctx.working {
                return;
            }
            let begun = ctx
                .orchestrator
                .borrow_mut()
                .begin(&ctx.activity, character, *options);
            start(begun, ctx.clone());
        })
    };

    let on_retry = {
        let ctx = ctx.clone();
        let character = props.character;
        Callback::from(move |_: MouseEvent| {
            if *ctx.working {
                return;
            }
            let begun = ctx
                .orchestrator
                .borrow_mut()
                .begin_retry(&ctx.activity, character);
            start(begun, ctx.clone());
        })
    };

    let on_days = {
        let options = options.clone();
        Callback::from(move |e: InputEvent| {
            let mut next = *options;
            next.days_to_spend = parse_number::<u32>(&e).filter(|days| *days > 0);
            options.set(next);
        })
    };
    let on_economy = {
        let options = options.clone();
        Callback::from(move |e: InputEvent| {
            let mut next = *options;
            next.economy_bonus = parse_number::<i32>(&e);
            options.set(next);
        })
    };
    let on_roll = {
        let options = options.clone();
        Callback::from(move |e: InputEvent| {
            let mut next = *options;
            let text = e.target_unchecked_into::<HtmlInputElement>().value();
            next.roll_override = typed_roll(&text);
            options.set(next);
        })
    };

    let completed = progress.as_ref().is_some_and(Progress::is_completed);
    let allowed = preview
        .as_ref()
        .is_ok_and(|preview| preview.verdict.allowed);

    let details = match &preview {
        Ok(preview) => html! {
            <div class="attempt-panel__preview">
                <p class="attempt-panel__modifier">{ modifier_line(preview) }</p>
                <p class="attempt-panel__cost">{ cost_line(preview) }</p>
                if let Some(wages) = preview.wages {
                    <p class="attempt-panel__wages">
                        { format!("Expected pay: {} gp ({} gp/day x{:.2})", wages.total, wages.per_day, wages.performance) }
                    </p>
                }
                if !preview.verdict.allowed {
                    <ul class="attempt-panel__reasons">
                        { for preview.verdict.reasons.iter().map(|reason| html! {
                            <li class="attempt-panel__reason">{ reason.to_string() }</li>
                        }) }
                    </ul>
                }
            </div>
        },
        Err(err) => html! {
            <p class="attempt-panel__unavailable">{ err.to_string() }</p>
        },
    };

    let employment = activity.kind() == ActivityKind::Employment;
    let label = if *working { "Working..." } else { "Attempt" };

    html! {
        <section class="attempt-panel" data-activity={activity.id.to_string()}>
            <header class="attempt-panel__header">
                <h3>{ activity.name.clone() }</h3>
                <span class="attempt-panel__kind">{ activity.kind().to_string() }</span>
                if !activity.target.is_empty() {
                    <span class="attempt-panel__target">{ activity.target.clone() }</span>
                }
            </header>
            if let Some(progress) = progress.as_ref() {
                <ProgressMeter
                    accumulated={progress.accumulated}
                    required={progress.required}
                    goal={progress.goal}
                    percent={progress.percent_complete()}
                    completed={completed}
                />
            }
            { details }
            <div class="attempt-panel__options">
                if employment {
                    <label>
                        { "Days to work" }
                        <input type="number" min="1" class="attempt-panel__days" oninput={on_days} />
                    </label>
                    <label>
                        { "Economy bonus" }
                        <input type="number" class="attempt-panel__economy" oninput={on_economy} />
                    </label>
                }
                <label>
                    { "Fixed roll (1-20)" }
                    <input type="number" min="1" max="20" class="attempt-panel__roll" oninput={on_roll} />
                </label>
            </div>
            <div class="attempt-panel__actions">
                <Button
                    label={label}
                    onclick={on_attempt}
                    disabled={!allowed || completed}
                    busy={*working}
                />
                if can_retry && !*working {
                    <Button label="Retry" onclick={on_retry} />
                }
            </div>
            if let Some(message) = (*error).clone() {
                <p class="attempt-panel__error" role="alert">{ message }</p>
            }
            <p class="attempt-panel__status" aria-live="polite">{ (*status).clone().unwrap_or_default() }</p>
            if let Some(progress) = progress.as_ref() {
                <AttemptLog records={Rc::new(progress.log.clone())} />
            }
        </section>
    }
}
