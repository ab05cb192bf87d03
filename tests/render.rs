use futures::executor::block_on;
use parking_lot::Mutex;
use perch::{
    Deferred, Fetch, Hook, OptionKey, Paint, RenderError, RenderState, Template, View, ViewClass,
    ViewOptions,
};
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// A fetch hook whose templates arrive whenever the test resolves them.
fn pending_fetch() -> (Hook, Arc<Mutex<Vec<(String, Deferred<Template>)>>>) {
    let requests = Arc::new(Mutex::new(Vec::new()));
    let log = Arc::clone(&requests);
    let hook = Hook::fetch(move |locator| {
        let deferred: Deferred<Template> = Deferred::new();
        log.lock().push((locator.to_owned(), deferred.clone()));
        Ok(Fetch::from(deferred.promise()))
    });
    (hook, requests)
}

fn counting_fetch(hits: &Arc<AtomicUsize>) -> Hook {
    let hits = Arc::clone(hits);
    Hook::fetch(move |locator| {
        hits.fetch_add(1, Ordering::SeqCst);
        Ok(Fetch::from(format!("<p>{}</p>", locator)))
    })
}

#[test]
fn fetch_runs_once_per_pass() {
    let hits = Arc::new(AtomicUsize::new(0));
    let view = View::layout(
        ViewOptions::new()
            .set("template", "a")
            .hook(counting_fetch(&hits)),
    );

    let rendered = block_on(view.render()).expect("render should settle");
    assert_eq!(rendered, view, "the pass resolves with the view itself");
    assert_eq!(hits.load(Ordering::SeqCst), 1, "fetch should run exactly once");
    assert_eq!(view.el().markup(), "<p>a</p>");
    assert_eq!(view.state(), RenderState::Settled);
    assert!(view.pending().is_none(), "nothing in flight after settling");

    block_on(view.render()).expect("second render should settle");
    assert_eq!(hits.load(Ordering::SeqCst), 2, "each pass fetches once");
}

#[test]
fn fetch_works_on_class_definitions() {
    let hits = Arc::new(AtomicUsize::new(0));
    let class = ViewClass::layout(
        ViewOptions::new()
            .set("template", "a")
            .hook(counting_fetch(&hits)),
    );
    block_on(class.create(ViewOptions::new()).render()).expect("render should settle");
    assert_eq!(hits.load(Ordering::SeqCst), 1, "class-level fetch should be hit");
}

#[test]
fn prefix_is_prepended_to_the_locator() {
    let view = View::layout(
        ViewOptions::new()
            .set("prefix", "/templates/")
            .set("template", "main"),
    );
    block_on(view.render()).expect("render should settle");
    assert_eq!(
        view.el().markup(),
        "/templates/main",
        "the default fetch treats the locator as content"
    );
}

#[test]
fn data_flows_through_serialize_and_template() {
    let view = View::layout(ViewOptions::new().data("hi"));
    block_on(view.render()).expect("render should settle");
    assert_eq!(view.el().markup(), "hi", "default serialize and template pass data through");

    let named = View::layout(
        ViewOptions::new()
            .field("data", json!({}))
            .set("serialize", json!({ "name": "test" }))
            .hook(Hook::template(|data| {
                Ok(data["name"].as_str().unwrap_or_default().to_owned())
            })),
    );
    block_on(named.render()).expect("render should settle");
    assert_eq!(named.el().markup(), "test", "a plain serialize value is the template data");
}

#[test]
fn fetched_templates_can_be_compiled() {
    let view = View::layout(
        ViewOptions::new()
            .set("template", "bold")
            .data(json!({ "n": 1 }))
            .hook(Hook::fetch(|_| {
                Ok(Fetch::from(Template::compiled(|data| {
                    Ok(format!("<b>{}</b>", data["n"]))
                })))
            })),
    );
    block_on(view.render()).expect("render should settle");
    assert_eq!(view.el().markup(), "<b>1</b>");
}

#[test]
fn plain_template_values_are_content() {
    let view = View::layout(ViewOptions::new().set("template", json!(42)));
    block_on(view.render()).expect("render should settle");
    assert_eq!(view.el().markup(), "42");
}

#[test]
fn asynchronous_fetch() {
    let (fetch, requests) = pending_fetch();
    let view = View::layout(ViewOptions::new().set("template", "later").hook(fetch));

    let promise = view.render();
    assert!(!promise.is_settled(), "the pass waits for fetch");
    assert_eq!(view.state(), RenderState::Fetching);
    assert!(view.pending().map_or(false, |pending| pending.ptr_eq(&promise)));

    let (locator, deferred) = requests.lock()[0].clone();
    assert_eq!(locator, "later");
    deferred.resolve(Template::from("done"));

    assert_eq!(promise.result(), Some(Ok(view.clone())));
    assert_eq!(view.el().markup(), "done");
}

#[test]
fn restarting_supersedes_the_pass_in_flight() {
    let (fetch, requests) = pending_fetch();
    let view = View::layout(ViewOptions::new().set("template", "t").hook(fetch));

    let first = view.render();
    let second = view.render();
    assert_eq!(
        first.result(),
        Some(Err(RenderError::Superseded)),
        "the first promise is rejected as soon as the second pass starts"
    );

    let deferreds: Vec<_> = requests.lock().iter().map(|(_, d)| d.clone()).collect();
    assert_eq!(deferreds.len(), 2, "each pass fetched");

    deferreds[1].resolve(Template::from("second"));
    assert_eq!(second.result(), Some(Ok(view.clone())));
    assert_eq!(view.el().markup(), "second");

    deferreds[0].resolve(Template::from("first"));
    assert_eq!(view.el().markup(), "second", "the stale pass must not insert");
    assert_eq!(view.state(), RenderState::Settled, "the stale pass must not change state");
    assert_eq!(first.result(), Some(Err(RenderError::Superseded)));
}

#[test]
fn fetch_failures_reject_without_inserting() {
    let view = View::layout(
        ViewOptions::new()
            .set("template", "missing")
            .hook(Hook::fetch(|_| Err("not found".into()))),
    );
    let result = block_on(view.render());
    assert_eq!(
        result,
        Err(RenderError::Fetch {
            locator: "missing".into(),
            message: "not found".into(),
        })
    );
    assert_eq!(view.state(), RenderState::Failed);
    assert!(view.el().is_empty(), "nothing should be inserted");
}

#[test]
fn rejected_fetches_fail_the_pass() {
    let (fetch, requests) = pending_fetch();
    let view = View::layout(ViewOptions::new().set("template", "t").hook(fetch));
    let promise = view.render();
    let deferred = requests.lock()[0].1.clone();
    deferred.reject(RenderError::fetch("t", "timeout"));
    assert_eq!(promise.result(), Some(Err(RenderError::fetch("t", "timeout"))));
    assert_eq!(view.state(), RenderState::Failed);
}

#[test]
fn template_and_insertion_failures() {
    let broken_template = View::layout(
        ViewOptions::new().hook(Hook::template(|_| Err("bad template".into()))),
    );
    assert_eq!(
        block_on(broken_template.render()),
        Err(RenderError::Template("bad template".into()))
    );

    let broken_serialize = View::layout(
        ViewOptions::new().hook(Hook::serialize(|_| Err("bad data".into()))),
    );
    assert_eq!(
        block_on(broken_serialize.render()),
        Err(RenderError::Template("bad data".into()))
    );

    let broken_html = View::layout(
        ViewOptions::new().hook(Hook::html(|_, _| Err("detached".into()))),
    );
    assert_eq!(
        block_on(broken_html.render()),
        Err(RenderError::Insertion("detached".into()))
    );
}

#[test]
fn non_invocable_hooks_are_reported_when_used() {
    let view = View::layout(ViewOptions::new().set("html", json!(1)));
    assert!(
        !view.options().get(OptionKey::Html).is_invocable(),
        "the plain value is accepted as-is"
    );
    assert_eq!(
        block_on(view.render()),
        Err(RenderError::InvalidOption {
            key: OptionKey::Html,
            expected: "an html hook",
        })
    );
}

#[test]
fn plain_fetch_values_are_templates() {
    let view = View::layout(
        ViewOptions::new()
            .set("template", "ignored")
            .set("fetch", "<i>fixed</i>"),
    );
    block_on(view.render()).expect("render should settle");
    assert_eq!(view.el().markup(), "<i>fixed</i>");
}

#[test]
fn render_hook_runs_once_and_can_defer() {
    let held: Arc<Mutex<Option<Paint>>> = Arc::new(Mutex::new(None));
    let calls = Arc::new(AtomicUsize::new(0));
    let hits = Arc::new(AtomicUsize::new(0));

    let slot = Arc::clone(&held);
    let counter = Arc::clone(&calls);
    let view = View::layout(
        ViewOptions::new()
            .set("template", "deferred")
            .hook(counting_fetch(&hits))
            .hook(Hook::render(move |paint| {
                counter.fetch_add(1, Ordering::SeqCst);
                *slot.lock() = Some(paint);
            })),
    );

    let promise = view.render();
    assert_eq!(calls.load(Ordering::SeqCst), 1, "render hook runs once per pass");
    assert_eq!(hits.load(Ordering::SeqCst), 0, "nothing happens before painting");
    assert_eq!(view.state(), RenderState::Idle);
    assert!(!promise.is_settled());

    let paint = held.lock().take().expect("the hook kept the paint");
    assert_eq!(paint.view(), view.id());
    paint.paint();
    assert_eq!(hits.load(Ordering::SeqCst), 1);
    assert_eq!(promise.result(), Some(Ok(view.clone())));
}

#[test]
fn unpainted_passes_never_settle() {
    let view = View::layout(ViewOptions::new().hook(Hook::render(|_paint| {})));
    let promise = view.render();
    assert!(!promise.is_settled(), "dropping the paint leaves the pass pending");
    assert!(view.pending().is_some());
}

#[test]
fn custom_deferred_factory_is_used() {
    let made = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&made);
    let view = View::layout(ViewOptions::new().hook(Hook::deferred(move || {
        counter.fetch_add(1, Ordering::SeqCst);
        Deferred::new()
    })));
    block_on(view.render()).expect("render should settle");
    assert_eq!(made.load(Ordering::SeqCst), 1);
}

#[test]
fn unmanaged_views_do_not_render() {
    let view = ViewClass::new(ViewOptions::new()).create(ViewOptions::new());
    assert!(!view.is_managed());
    assert_eq!(block_on(view.render()), Err(RenderError::Unmanaged(view.id())));
    assert_eq!(view.state(), RenderState::Idle);

    let opted_in = ViewClass::new(ViewOptions::new().set("manage", true))
        .create(ViewOptions::new().data("managed"));
    block_on(opted_in.render()).expect("managed plain views render");
    assert_eq!(opted_in.el().markup(), "managed");
}
