use fiber_dom::{
	build, component, deps, element,
	testing::{HostOp, NodeId, RecordingHost},
	Cleanup, Element, Hooks, Props, Renderer, Setter,
};
use std::cell::RefCell;


thread_local! {
	static LOG: RefCell<Vec<String>> = RefCell::new(Vec::new());
	static SETTER: RefCell<Option<Setter<i32>>> = RefCell::new(None);
}

fn log(entry: impl Into<String>) {
	LOG.with(|log| log.borrow_mut().push(entry.into()));
}

fn take_log() -> Vec<String> {
	LOG.with(|log| log.borrow_mut().drain(..).collect())
}

fn setup(element: Element) -> (Renderer<RecordingHost>, NodeId) {
	logging_::init();
	let mut host = RecordingHost::new();
	let container = host.create_container("root");
	let mut renderer = Renderer::new(host);
	renderer.render(element, container);
	renderer.flush().unwrap();
	(renderer, container)
}

fn counter(hooks: &mut Hooks<'_>, _: &Props) -> Element {
	let (count, set_count) = hooks.use_state(1);
	element!("button", Props::new().on("click", move |_| set_count.update(|c| c + 1)), count)
}

#[test]
fn counter_increments_on_click() {
	let (mut renderer, container) = setup(build(component!(counter), Props::new(), ()));
	assert_eq!(renderer.host().to_markup(container), "<button>1</button>");
	let button = renderer.host().children(container)[0];
	let text = renderer.host().children(button)[0];
	renderer.host_mut().clear_ops();

	assert_eq!(renderer.host().dispatch(button, "click", &()), 1);
	assert!(renderer.has_pending_work());
	renderer.flush().unwrap();

	assert_eq!(renderer.host().to_markup(container), "<button>2</button>");
	assert_eq!(
		renderer.host().ops(),
		[
			HostOp::RemoveEventListener { node: button, event: "click".to_owned() },
			HostOp::AddEventListener { node: button, event: "click".to_owned() },
			HostOp::SetProperty {
				node: text,
				name: "nodeValue".to_owned(),
				value: "2".to_owned()
			},
		]
	);
	assert_eq!(renderer.host().listener_count(button, "click"), 1);
}

#[test]
fn queued_updates_apply_in_order() {
	let (mut renderer, container) = setup(build(component!(counter), Props::new(), ()));
	let button = renderer.host().children(container)[0];

	renderer.host().dispatch(button, "click", &());
	renderer.host().dispatch(button, "click", &());
	renderer.flush().unwrap();
	assert_eq!(renderer.host().text_content(container), "3");

	let component = renderer.fibers()[renderer.current_root().unwrap()].child().unwrap();
	let hooks = renderer.fibers()[component].hooks();
	assert_eq!(hooks[0].state::<i32>(), Some(&3));
	assert_eq!(hooks[0].pending_actions(), 0);
}

#[test]
fn deleted_listeners_are_detached() {
	let (mut renderer, container) = setup(build(component!(counter), Props::new(), ()));
	let button = renderer.host().children(container)[0];
	renderer.host_mut().clear_ops();

	renderer.render(build("p", Props::new(), ()), container);
	renderer.flush().unwrap();

	let p = renderer.host().children(container)[0];
	assert_eq!(
		renderer.host().ops(),
		[
			HostOp::CreateElement { node: p, tag: "p".to_owned() },
			HostOp::RemoveEventListener { node: button, event: "click".to_owned() },
			HostOp::RemoveChild { parent: container, child: button },
			HostOp::AppendChild { parent: container, child: p },
		]
	);
	assert_eq!(renderer.host().dispatch(button, "click", &()), 0);
}

#[test]
fn render_request_overrides_pending_state_change() {
	let (mut renderer, container) = setup(build(component!(counter), Props::new(), ()));
	let button = renderer.host().children(container)[0];

	renderer.host().dispatch(button, "click", &());
	renderer.render(build("p", Props::new(), ()), container);
	renderer.flush().unwrap();
	assert_eq!(renderer.host().to_markup(container), "<p></p>");
}

#[test]
fn render_request_keeps_queued_state_changes() {
	let (mut renderer, container) = setup(build(component!(counter), Props::new(), ()));
	let button = renderer.host().children(container)[0];

	renderer.host().dispatch(button, "click", &());
	renderer.render(build(component!(counter), Props::new(), ()), container);
	renderer.flush().unwrap();
	assert_eq!(renderer.host().to_markup(container), "<button>2</button>");
	assert_eq!(renderer.host().children(container), [button]);
}

fn lifecycle(hooks: &mut Hooks<'_>, props: &Props) -> Element {
	let label = props.text("label").unwrap_or_default().to_owned();
	hooks.use_effect(deps![], {
		let label = label.clone();
		move || {
			log(format!("mount {}", label));
			Some(Cleanup::new(move || log(format!("unmount {}", label))))
		}
	});
	hooks.use_effect(None, || {
		log("render");
		Some(Cleanup::new(|| log("cleanup render")))
	});
	hooks.use_effect(deps![label.clone()], {
		let label = label.clone();
		move || {
			log(format!("label {}", label));
			None
		}
	});
	build("span", Props::new(), label)
}

#[test]
fn effects_follow_their_dependencies() {
	let labelled = |label: &str| build("div", Props::new(), build(component!(lifecycle), Props::new().with("label", label), ()));
	let (mut renderer, container) = setup(labelled("a"));
	assert_eq!(take_log(), ["mount a", "render", "label a"]);

	renderer.render(labelled("a"), container);
	renderer.flush().unwrap();
	assert_eq!(take_log(), ["cleanup render", "render"]);

	renderer.render(labelled("b"), container);
	renderer.flush().unwrap();
	assert_eq!(take_log(), ["cleanup render", "render", "label b"]);
	assert_eq!(renderer.host().to_markup(container), "<div><span>b</span></div>");

	renderer.render(build("div", Props::new(), ()), container);
	renderer.flush().unwrap();
	assert_eq!(take_log(), ["unmount a", "cleanup render"]);
	assert_eq!(renderer.host().to_markup(container), "<div></div>");
}

#[test]
fn deleting_a_subtree_cleans_up_nested_components_in_order() {
	let nested = build(
		"div",
		Props::new(),
		(
			build(component!(lifecycle), Props::new().with("label", "outer"), ()),
			build("p", Props::new(), build(component!(lifecycle), Props::new().with("label", "inner"), ())),
		),
	);
	let (mut renderer, container) = setup(build("main", Props::new(), nested));
	take_log();

	renderer.render(build("main", Props::new(), ()), container);
	renderer.flush().unwrap();
	assert_eq!(take_log(), ["unmount outer", "cleanup render", "unmount inner", "cleanup render"]);
	assert_eq!(renderer.host().to_markup(container), "<main></main>");
}

fn remote_controlled(hooks: &mut Hooks<'_>, _: &Props) -> Element {
	let (value, set_value) = hooks.use_state(0);
	hooks.use_effect(deps![], move || {
		SETTER.with(|setter| *setter.borrow_mut() = Some(set_value));
		None
	});
	build("output", Props::new(), value)
}

#[test]
fn setters_captured_once_stay_live() {
	let (mut renderer, container) = setup(build(component!(remote_controlled), Props::new(), ()));
	let setter = SETTER.with(|setter| setter.borrow().clone()).unwrap();

	for value in [5, 6, 7] {
		setter.set(value);
		renderer.flush().unwrap();
		assert_eq!(renderer.host().text_content(container), value.to_string());
	}
}

#[test]
fn state_change_during_render_is_not_lost() {
	let (mut renderer, container) = setup(build(
		"div",
		Props::new(),
		(build(component!(remote_controlled), Props::new(), ()), build("span", Props::new(), "tail")),
	));
	let setter = SETTER.with(|setter| setter.borrow().clone()).unwrap();

	setter.set(1);
	assert_eq!(renderer.tick(fiber_dom::UnitBudget(3)).unwrap(), fiber_dom::Progress::Yielded);
	setter.set(2);
	renderer.flush().unwrap();
	assert_eq!(renderer.host().text_content(container), "2tail");
}
