use yew::prelude::*;

#[derive(Properties, PartialEq, Clone)]
pub struct Props {
    pub label: AttrValue,
    #[prop_or_default]
    pub onclick: Callback<MouseEvent>,
    #[prop_or_default]
    pub disabled: bool,
    /// Marks the button as waiting on the server.
    #[prop_or_default]
    pub busy: bool,
}

#[function_component(Button)]
pub fn button(p: &Props) -> Html {
    let onclick = p.onclick.clone();
    let class = classes!("btn", p.busy.then_some("btn--busy"));
    html! {
        <button
            type="button"
            {class}
            {onclick}
            disabled={p.disabled || p.busy}
            aria-busy={p.busy.to_string()}
        >
            { p.label.clone() }
        </button>
    }
}
