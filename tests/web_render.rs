#![cfg(all(target_arch = "wasm32", feature = "web"))]

use fiber_dom::{build, web::DomHost, Host, Props, Renderer, Style, UnitBudget};
use wasm_bindgen::JsCast;
use wasm_bindgen_test::{wasm_bindgen_test, wasm_bindgen_test_configure};
use web_sys::{window, HtmlElement};

wasm_bindgen_test_configure!(run_in_browser);

fn container(host: &mut DomHost) -> web_sys::Node {
	let container = host.create_element("div").unwrap();
	let body = window().unwrap().document().unwrap().body().unwrap();
	body.append_child(&container).unwrap();
	container
}

#[wasm_bindgen_test]
fn render_and_update() {
	let _ = tracing_wasm::try_set_as_global_default();

	let mut host = DomHost::for_window().unwrap();
	let container = container(&mut host);
	let mut renderer = Renderer::new(host);

	renderer.render(
		build("p", Props::new().with("id", "fiber-dom-render").with("style", Style::new().with("fontWeight", "bold")), "Hello fiber-dom!"),
		container.clone(),
	);
	while renderer.tick(UnitBudget(1)).unwrap() != fiber_dom::Progress::Committed {}

	let p: HtmlElement = container.first_child().unwrap().dyn_into().unwrap();
	assert_eq!(p.id(), "fiber-dom-render");
	assert_eq!(p.text_content().as_deref(), Some("Hello fiber-dom!"));
	assert_eq!(p.style().get_property_value("font-weight").unwrap(), "bold");

	renderer.render(build("p", Props::new(), "Bye."), container.clone());
	renderer.flush().unwrap();
	let same: HtmlElement = container.first_child().unwrap().dyn_into().unwrap();
	assert_eq!(same, p);
	assert_eq!(p.id(), "");
	assert_eq!(p.text_content().as_deref(), Some("Bye."));

	renderer.render(build("span", Props::new(), ()), container.clone());
	renderer.flush().unwrap();
	assert_eq!(container.child_nodes().length(), 1);
	assert_eq!(container.first_child().unwrap().node_name(), "SPAN");
}

#[wasm_bindgen_test]
fn immediate() {
	let mut host = DomHost::for_window().unwrap();
	let container = container(&mut host);
	fiber_dom::render_immediate(&mut host, &build("ul", Props::new(), [build("li", Props::new(), 1), build("li", Props::new(), 2)]), &container).unwrap();
	assert_eq!(container.text_content().as_deref(), Some("12"));
}
