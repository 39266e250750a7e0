use downtime_game::{Activity, ActivityOrchestrator, BoardSnapshot, CharacterId, DowntimeRules};
use std::cell::RefCell;
use std::rc::Rc;
use yew::prelude::*;

use crate::components::attempt_panel::AttemptPanel;
use crate::components::grade_notice::GradeNotice;

#[derive(Clone, PartialEq)]
pub enum LoadState {
    Loading,
    Ready(Rc<Vec<Rc<Activity>>>, CharacterId),
    Failed(AttrValue),
}

/// Build an orchestrator seeded from a board read.
#[must_use]
pub fn orchestrator_for(board: &BoardSnapshot) -> ActivityOrchestrator {
    let mut orchestrator = ActivityOrchestrator::new(DowntimeRules::embedded().clone());
    orchestrator.load_board(board);
    orchestrator
}

#[must_use]
pub fn board_activities(board: &BoardSnapshot) -> Rc<Vec<Rc<Activity>>> {
    Rc::new(board.activities.iter().cloned().map(Rc::new).collect())
}

#[derive(Properties, Clone)]
pub struct BoardProps {
    pub orchestrator: Rc<RefCell<ActivityOrchestrator>>,
    pub activities: Rc<Vec<Rc<Activity>>>,
    pub character: CharacterId,
    #[prop_or_default]
    pub token: Option<AttrValue>,
}

impl PartialEq for BoardProps {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.orchestrator, &other.orchestrator)
            && Rc::ptr_eq(&self.activities, &other.activities)
            && self.character == other.character
            && self.token == other.token
    }
}

/// Character summary, one panel per activity, and the grade-up notice.
#[function_component(DowntimeBoard)]
pub fn downtime_board(props: &BoardProps) -> Html {
    let revision = use_state(|| 0_u32);

    let on_changed = {
        let revision = revision.clone();
        Callback::from(move |()| revision.set(revision.wrapping_add(1)))
    };
    let on_dismiss = {
        let orchestrator = props.orchestrator.clone();
        let on_changed = on_changed.clone();
        Callback::from(move |()| {
            let _ = orchestrator.borrow_mut().take_grade_notice();
            on_changed.emit(());
        })
    };

    let (summary, notice) = {
        let orchestrator = props.orchestrator.borrow();
        let summary = orchestrator.cache().character(props.character).map(|character| {
            html! {
                <header class="board__character">
                    <h2>{ character.name.clone() }</h2>
                    <span class="board__level">{ format!("Level {}", character.level) }</span>
                    <span class="board__gold">{ format!("{} gp", character.gold) }</span>
                    <span class="board__days">{ format!("{} free days", character.free_days) }</span>
                </header>
            }
        });
        (summary, orchestrator.pending_grade_notice().cloned())
    };

    html! {
        <main class="board">
            { summary.unwrap_or_default() }
            if props.activities.is_empty() {
                <p class="board__empty">{ "No downtime activities yet." }</p>
            }
            { for props.activities.iter().map(|activity| html! {
                <AttemptPanel
                    key={activity.id.to_string()}
                    activity={activity.clone()}
                    character={props.character}
                    orchestrator={props.orchestrator.clone()}
                    revision={*revision}
                    token={props.token.clone()}
                    on_changed={on_changed.clone()}
                />
            }) }
            <GradeNotice notice={notice} on_dismiss={on_dismiss} />
        </main>
    }
}

/// Root component: reads the session, loads the board, then hands off to
/// [`DowntimeBoard`].
#[function_component(App)]
pub fn app() -> Html {
    let load = use_state(|| LoadState::Loading);
    let orchestrator = use_mut_ref(|| ActivityOrchestrator::new(DowntimeRules::embedded().clone()));
    let session = use_memo((), |()| crate::api::Session::from_storage_or_default());

    {
        let load = load.clone();
        let orchestrator = orchestrator.clone();
        let session = session.clone();
        use_effect_with((), move |()| {
            #[cfg(target_arch = "wasm32")]
            wasm_bindgen_futures::spawn_local(async move {
                match crate::api::fetch_board(&session).await {
                    Ok(board) => {
                        *orchestrator.borrow_mut() = orchestrator_for(&board);
                        load.set(LoadState::Ready(board_activities(&board), board.character.id));
                    }
                    Err(err) => {
                        crate::dom::console_error(&format!("board load failed: {err}"));
                        load.set(LoadState::Failed(err.to_string().into()));
                    }
                }
            });
            #[cfg(not(target_arch = "wasm32"))]
            {
                let _ = (&load, &orchestrator, &session);
            }
        });
    }

    let token = session.token.clone().map(AttrValue::from);
    match &*load {
        LoadState::Loading => html! {
            <p class="app__loading" aria-busy="true">{ "Loading downtime board..." }</p>
        },
        LoadState::Failed(message) => html! {
            <p class="app__error" role="alert">{ message.clone() }</p>
        },
        LoadState::Ready(activities, character) => html! {
            <DowntimeBoard
                orchestrator={orchestrator}
                activities={activities.clone()}
                character={*character}
                token={token}
            />
        },
    }
}
