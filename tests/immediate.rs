use fiber_dom::{
	build, component, element, render_immediate,
	testing::{HostOp, RecordingHost},
	Element, Hooks, Props, RenderError,
};


fn greeting(hooks: &mut Hooks<'_>, props: &Props) -> Element {
	let (name, set_name) = hooks.use_state(props.text("name").unwrap_or("world").to_owned());
	hooks.use_effect(None, move || {
		set_name.set("never".to_owned());
		None
	});
	element!("p", Props::new().with("class", "greeting"), "Hello ", name, "!")
}

#[test]
fn mounts_everything_at_once() {
	logging_::init();
	let mut host = RecordingHost::new();
	let container = host.create_container("body");

	render_immediate(
		&mut host,
		&build("main", Props::new(), (build(component!(greeting), Props::new().with("name", "fibers"), ()), build("hr", Props::new(), ()))),
		&container,
	)
	.unwrap();

	assert_eq!(host.to_markup(container), r#"<main><p class="greeting">Hello fibers!</p><hr></hr></main>"#);
	let main = host.children(container)[0];
	assert_eq!(host.ops().last(), Some(&HostOp::AppendChild { parent: container, child: main }));
}

#[test]
fn malformed_children_leave_the_container_untouched() {
	logging_::init();
	let mut host = RecordingHost::new();
	let container = host.create_container("body");
	let malformed = Element::new("ul", Props::new().with("children", "not a list"));

	match render_immediate(&mut host, &build("div", Props::new(), malformed), &container) {
		Err(RenderError::MalformedChildren { element_type }) => assert_eq!(element_type, "ul"),
		other => panic!("Unexpected result: {:?}", other),
	}
	assert!(host.children(container).is_empty());
}

#[test]
fn host_failures_propagate() {
	logging_::init();
	let mut host = RecordingHost::new();
	let container = host.create_container("body");
	host.fail_when(|op| matches!(op, HostOp::SetProperty { name, .. } if name == "id"));

	let result = render_immediate(&mut host, &build("div", Props::new().with("id", "x"), ()), &container);
	assert!(matches!(result, Err(RenderError::Host(_))));
	assert!(host.children(container).is_empty());
}
