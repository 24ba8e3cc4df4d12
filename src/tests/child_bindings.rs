use super::*;

#[test]
fn grouped_child_events_bind_on_descendants_only() -> Result<()> {
    let mut engine = Engine::from_html(
        "<ul id='list'><li id='a'>a</li></ul><ol><li id='outside'>o</li></ol>",
    )?;
    let log = Log::default();
    let targets = Log::default();
    let seen = targets.clone();
    let config = Config::builder()
        .events(Events::new().group(
            "click",
            Events::new().child(
                "li",
                Events::new()
                    .on("click", log.recorder("click"))
                    .on("click", move |engine, call| {
                        seen.push(engine.document().node_label(call.target));
                        Ok(())
                    }),
            ),
        ))
        .build();
    engine.register("ul", &config)?;

    let a = node(&engine, "a");
    let outside = node(&engine, "outside");
    engine.click(a)?;
    engine.click(outside)?;
    assert_eq!(log.entries(), vec!["click:#a"]);
    assert_eq!(targets.entries(), vec!["#list"]);
    assert_eq!(engine.listener_count(outside, "click"), 0);
    Ok(())
}

#[test]
fn child_bindings_stay_inside_their_owner() -> Result<()> {
    let mut engine = Engine::from_html(
        "<ul id='one'><li id='a'>a</li></ul><ul id='two'><li id='b'>b</li></ul>",
    )?;
    let log = Log::default();
    let config = Config::builder()
        .events(Events::new().child("li", Events::new().on("click", log.recorder("click"))))
        .build();
    engine.register("ul", &config)?;

    let a = node(&engine, "a");
    let b = node(&engine, "b");
    assert_eq!(engine.listener_count(a, "click"), 1);
    assert_eq!(engine.listener_count(b, "click"), 1);
    engine.click(a)?;
    engine.click(b)?;
    assert_eq!(log.entries(), vec!["click:#a", "click:#b"]);
    Ok(())
}

#[test]
fn child_groups_under_different_labels_both_bind() -> Result<()> {
    let mut engine = Engine::from_html("<ul><li id='a'>a</li></ul>")?;
    let log = Log::default();
    let config = Config::builder()
        .events(
            Events::new()
                .group("click", Events::new().child("li", Events::new().on("click", log.recorder("click"))))
                .group(
                    "dblclick",
                    Events::new().child("li", Events::new().on("dblclick", log.recorder("dblclick"))),
                ),
        )
        .build();
    engine.register("ul", &config)?;
    assert_eq!(engine.child_registration_count(), 2);

    let a = node(&engine, "a");
    engine.click(a)?;
    engine.dispatch_custom_event(a, "dblclick", EventInit::bubbling())?;
    assert_eq!(log.entries(), vec!["click:#a", "dblclick:#a"]);
    Ok(())
}

#[test]
fn repeated_child_key_registers_once() -> Result<()> {
    let mut engine = Engine::from_html("<ul><li id='a'>a</li></ul>")?;
    let log = Log::default();
    let config = Config::builder()
        .events(
            Events::new()
                .child("li", Events::new().on("click", log.recorder("first")))
                .child("li", Events::new().on("click", log.recorder("second"))),
        )
        .build();
    engine.register("ul", &config)?;
    assert_eq!(engine.child_registration_count(), 1);

    let a = node(&engine, "a");
    engine.click(a)?;
    assert_eq!(log.entries(), vec!["first:#a"]);
    Ok(())
}

#[test]
fn root_prefixed_child_matches_outside_the_owner() -> Result<()> {
    let mut engine = Engine::from_html(
        "<body><button id='open'>open</button><div id='dialog' class='modal'></div></body>",
    )?;
    let log = Log::default();
    let seen = log.clone();
    let config = Config::builder()
        .events(Events::new().child(
            ":root #dialog",
            Events::new().on("click", move |engine, call| {
                seen.push(format!(
                    "{} for {}",
                    engine.document().node_label(call.element),
                    engine.document().node_label(call.target)
                ));
                Ok(())
            }),
        ))
        .build();
    engine.register("#open", &config)?;

    let dialog = node(&engine, "dialog");
    assert_eq!(engine.listener_count(dialog, "click"), 1);
    engine.click(dialog)?;
    assert_eq!(log.entries(), vec!["#dialog for #open"]);
    let open = node(&engine, "open");
    let owner = engine.context_for(open, &config).expect("bound");
    let child = engine
        .contexts(dialog)
        .into_iter()
        .next()
        .expect("child context");
    assert!(child.parent().expect("inherits").ptr_eq(&owner));
    assert_eq!(child.target(), open);
    Ok(())
}

#[test]
fn removing_the_owner_unregisters_its_children() -> Result<()> {
    let mut engine = Engine::from_html(
        "<body><div id='host'><button id='open'>open</button></div><div id='dialog'></div></body>",
    )?;
    let log = Log::default();
    let config = Config::builder()
        .events(Events::new().child(
            ":root #dialog",
            Events::new().on("click", log.recorder("click")),
        ))
        .build();
    engine.register("#open", &config)?;
    assert_eq!(engine.child_registration_count(), 1);
    assert_eq!(engine.registration_count(), 2);

    let open = node(&engine, "open");
    let dialog = node(&engine, "dialog");
    engine.document_mut().remove_node(open)?;
    engine.flush()?;

    assert_eq!(engine.child_registration_count(), 0);
    assert_eq!(engine.registration_count(), 1);
    assert_eq!(engine.listener_count(dialog, "click"), 0);
    assert!(!engine.is_bound(dialog));
    engine.click(dialog)?;
    assert!(log.entries().is_empty());
    Ok(())
}

#[test]
fn scope_marker_composes_direct_children() -> Result<()> {
    let mut engine = Engine::from_html(
        "<ul id='list'><li id='direct'>d<ul><li id='nested'>n</li></ul></li></ul>",
    )?;
    let log = Log::default();
    let config = Config::builder()
        .events(Events::new().child(
            ":scope > li",
            Events::new().on("click", log.recorder("click")),
        ))
        .build();
    engine.register("#list", &config)?;

    let direct = node(&engine, "direct");
    let nested = node(&engine, "nested");
    assert_eq!(engine.listener_count(direct, "click"), 1);
    assert_eq!(engine.listener_count(nested, "click"), 0);
    Ok(())
}

#[test]
fn placeholders_read_the_owner_dataset() -> Result<()> {
    let mut engine = Engine::from_html(
        "<div class='tabs' data-pane='first' data-empty=''>\
           <p id='first' class='first'></p><p id='second' class='second'></p>\
         </div>",
    )?;
    let config = Config::builder()
        .events(Events::new().child(".{pane}", Events::new().on("click", |_, _| Ok(()))))
        .build();
    engine.register(".tabs", &config)?;

    let first = node(&engine, "first");
    let second = node(&engine, "second");
    assert_eq!(engine.listener_count(first, "click"), 1);
    assert_eq!(engine.listener_count(second, "click"), 0);

    let tabs = engine.find_descendant(engine.document().root(), ".tabs")?.expect("tabs");
    assert_eq!(engine.format_placeholders(tabs, ".{pane} .{empty} .{missing}"), ".first .{empty} .{missing}");
    Ok(())
}

#[test]
fn compose_selector_crosses_groups() -> Result<()> {
    assert_eq!(
        resolver::compose_selector("ul, ol", "li, :scope > p")?,
        "ul li, ol li, ul > p, ol > p"
    );
    assert_eq!(resolver::compose_selector("", "li")?, "li");
    Ok(())
}

#[test]
fn nested_callbacks_fire_for_child_elements() -> Result<()> {
    let mut engine = Engine::from_html("<nav id='nav'><a id='home'></a><a id='docs'></a></nav>")?;
    let log = Log::default();
    let config = Config::builder()
        .callbacks(
            Callbacks::new()
                .created(log.recorder("nav"))
                .child(
                    "a",
                    Callbacks::new()
                        .created(log.recorder("link"))
                        .removed(log.recorder("gone")),
                ),
        )
        .build();
    engine.register("nav", &config)?;
    assert_eq!(log.entries(), vec!["link:#home", "link:#docs", "nav:#nav"]);

    let docs = node(&engine, "docs");
    engine.document_mut().remove_node(docs)?;
    engine.flush()?;
    assert_eq!(log.count("gone:#docs"), 1);
    Ok(())
}

#[test]
fn delegated_shortcut_resolves_methods_through_the_owner() -> Result<()> {
    let mut engine = Engine::from_html(
        "<div id='note' class='notification'>hi<button id='close' class='delete'></button></div>",
    )?;
    let log = Log::default();
    let config = Config::builder()
        .method("dismiss", |engine, call| {
            engine.document_mut().remove_node(call.target)
        })
        .shortcut(
            "click",
            Shortcut::Delegated(vec![("button.delete".into(), Action::named("dismiss"))]),
        )
        .callbacks(Callbacks::new().removed(log.recorder("removed")))
        .build();
    engine.register(".notification", &config)?;
    assert_eq!(engine.child_registration_count(), 1);

    let note = node(&engine, "note");
    let close = node(&engine, "close");
    engine.click(close)?;
    assert!(!engine.document().is_connected(note));
    assert_eq!(log.entries(), vec!["removed:#note"]);
    assert_eq!(engine.child_registration_count(), 0);
    assert_eq!(engine.listener_count(close, "click"), 0);
    Ok(())
}

#[test]
fn named_shortcut_directive_binds_on_the_element() -> Result<()> {
    let mut engine = Engine::from_html("<button id='b'></button>")?;
    let log = Log::default();
    let config = Config::builder()
        .method("toggle", log.recorder("toggle"))
        .directive("events_click", "toggle")
        .build();
    engine.register("#b", &config)?;
    let b = node(&engine, "b");
    engine.click(b)?;
    assert_eq!(log.entries(), vec!["toggle:#b"]);
    Ok(())
}

#[test]
fn children_of_a_late_element_bind_when_it_is_inserted() -> Result<()> {
    let mut engine = Engine::from_html("<main id='main'></main>")?;
    let log = Log::default();
    let config = Config::builder()
        .events(Events::new().child("li", Events::new().on("click", log.recorder("click"))))
        .build();
    engine.register("ul", &config)?;

    let main = node(&engine, "main");
    engine
        .document_mut()
        .set_inner_html(main, "<ul id='list'><li id='a'>a</li></ul>")?;
    engine.flush()?;
    let list = node(&engine, "list");
    let b = engine
        .document_mut()
        .create_element_with_attrs("li", [("id", "b")]);
    engine.document_mut().append_child(list, b)?;
    engine.flush()?;

    let a = node(&engine, "a");
    engine.click(a)?;
    engine.click(b)?;
    assert_eq!(log.entries(), vec!["click:#a", "click:#b"]);
    assert_eq!(engine.listener_count(a, "click"), 1);
    Ok(())
}

#[test]
fn bare_scope_key_binds_the_owner_itself() -> Result<()> {
    let mut engine = Engine::from_html("<ul id='one'><li>a</li></ul><ul id='two'></ul>")?;
    let log = Log::default();
    let config = Config::builder()
        .events(Events::new().child(":scope", Events::new().on("click", log.recorder("click"))))
        .build();
    engine.register("ul", &config)?;

    let one = node(&engine, "one");
    let two = node(&engine, "two");
    assert_eq!(engine.child_registration_count(), 2);
    assert_eq!(engine.listener_count(one, "click"), 1);
    assert_eq!(engine.listener_count(two, "click"), 1);
    engine.click(one)?;
    assert_eq!(log.entries(), vec!["click:#one"]);
    Ok(())
}

#[test]
fn discarded_owners_leave_no_selector_entries_behind() -> Result<()> {
    let mut engine = Engine::from_html("<div id='host'></div>")?;
    let config = Config::builder()
        .events(Events::new().child(".{pane}", Events::new().on("click", |_, _| Ok(()))))
        .build();
    engine.register(".tabs", &config)?;
    let host = node(&engine, "host");
    let entries = engine.registry.entry_count();
    let cached = engine.document().cached_selector_count();

    for round in 0..4 {
        let markup = format!("<div class='tabs' data-pane='p{round}'><p class='p{round}'></p></div>");
        engine.document_mut().set_inner_html(host, &markup)?;
        engine.flush()?;
        assert_eq!(engine.child_registration_count(), 1);
        assert_eq!(engine.registry.entry_count(), entries + 1);
    }
    engine.document_mut().set_inner_html(host, "")?;
    engine.flush()?;

    assert_eq!(engine.child_registration_count(), 0);
    assert_eq!(engine.registry.entry_count(), entries);
    assert_eq!(engine.document().cached_selector_count(), cached);
    assert_eq!(engine.registered_selectors(), vec![".tabs"]);
    Ok(())
}
