use super::*;

#[test]
fn registering_twice_binds_each_element_once() -> Result<()> {
    let mut engine = Engine::from_html("<ul id='list'></ul>")?;
    let log = Log::default();
    let config = lifecycle_config(&log);
    engine.register("li.item", &config)?;
    engine.register("li.item", &config)?;
    assert_eq!(engine.registration_count(), 1);

    let list = node(&engine, "list");
    let li = engine
        .document_mut()
        .create_element_with_attrs("li", [("id", "x"), ("class", "item")]);
    engine.document_mut().append_child(list, li)?;
    engine.flush()?;

    assert_eq!(log.entries(), vec!["created:#x", "added:#x"]);
    assert_eq!(engine.contexts(li).len(), 1);
    Ok(())
}

#[test]
fn rescan_refires_added_without_rebinding() -> Result<()> {
    let mut engine = Engine::from_html("<ul><li id='a'>a</li></ul>")?;
    let log = Log::default();
    let clicks = Log::default();
    let config = Config::builder()
        .callbacks(
            Callbacks::new()
                .created(log.recorder("created"))
                .added(log.recorder("added")),
        )
        .events(Events::new().on("click", clicks.recorder("click")))
        .build();
    engine.register("li", &config)?;
    let a = node(&engine, "a");
    let first = engine.context_for(a, &config).expect("bound");

    engine.rescan(a)?;
    engine.rescan(a)?;

    assert_eq!(log.entries(), vec!["created:#a", "added:#a", "added:#a", "added:#a"]);
    assert_eq!(engine.contexts(a).len(), 1);
    assert!(engine.context_for(a, &config).expect("bound").ptr_eq(&first));
    assert_eq!(engine.listener_count(a, "click"), 1);

    engine.click(a)?;
    assert_eq!(clicks.entries(), vec!["click:#a"]);
    Ok(())
}

#[test]
fn duplicate_registration_refires_added_on_current_matches() -> Result<()> {
    let mut engine = Engine::from_html("<p id='p'></p>")?;
    let log = Log::default();
    let config = lifecycle_config(&log);
    engine.register("p", &config)?;
    engine.register("p", &config)?;
    assert_eq!(log.entries(), vec!["created:#p", "added:#p", "added:#p"]);
    Ok(())
}

#[test]
fn removal_fires_removed_once_and_updates_refs() -> Result<()> {
    let mut engine = Engine::from_html(
        "<ul id='list'><li id='a'>a</li><li id='b'>b</li></ul>",
    )?;
    let log = Log::default();
    engine.register("li", &lifecycle_config(&log))?;
    let owner = Config::builder()
        .refs(Refs::Named(vec![RefSpec::many("items", "li")]))
        .build();
    engine.register("ul", &owner)?;

    let list = node(&engine, "list");
    let a = node(&engine, "a");
    let b = node(&engine, "b");
    let context = engine.context_for(list, &owner).expect("bound");
    assert_eq!(context.refs("items"), vec![a, b]);

    log.clear();
    engine.document_mut().remove_node(a)?;
    engine.flush()?;

    assert_eq!(log.entries(), vec!["removed:#a"]);
    assert_eq!(context.refs("items"), vec![b]);
    assert!(!engine.is_bound(a));

    engine.flush()?;
    assert_eq!(log.count("removed:#a"), 1);
    Ok(())
}

#[test]
fn reinserted_element_gets_a_fresh_context() -> Result<()> {
    let mut engine = Engine::from_html("<ul id='list'><li id='a'>a</li></ul>")?;
    let log = Log::default();
    let config = lifecycle_config(&log);
    engine.register("li", &config)?;

    let list = node(&engine, "list");
    let a = node(&engine, "a");
    let before = engine.context_for(a, &config).expect("bound");
    before.set("note", "kept?");

    engine.document_mut().remove_node(a)?;
    engine.flush()?;
    engine.document_mut().append_child(list, a)?;
    engine.flush()?;

    let after = engine.context_for(a, &config).expect("rebound");
    assert_ne!(before.id(), after.id());
    assert_eq!(after.get("note"), Value::Null);
    assert_eq!(
        log.entries(),
        vec!["created:#a", "added:#a", "removed:#a", "created:#a", "added:#a"]
    );
    Ok(())
}

#[test]
fn moving_a_bound_element_rebinds_it() -> Result<()> {
    let mut engine = Engine::from_html("<ul id='one'><li id='a'>a</li></ul><ul id='two'></ul>")?;
    let log = Log::default();
    let config = lifecycle_config(&log);
    engine.register("li", &config)?;
    log.clear();

    let two = node(&engine, "two");
    let a = node(&engine, "a");
    engine.document_mut().append_child(two, a)?;
    engine.flush()?;

    // The move is recorded as a removal followed by an insertion.
    assert_eq!(log.entries(), vec!["removed:#a", "created:#a", "added:#a"]);
    assert_eq!(engine.contexts(a).len(), 1);
    Ok(())
}

#[test]
fn dynamic_insertion_matches_registration_time_binding() -> Result<()> {
    fn nested_config(log: &Log) -> Config {
        Config::builder()
            .callbacks(
                Callbacks::new()
                    .created(log.recorder("created"))
                    .added(log.recorder("added"))
                    .child(
                        "li",
                        Callbacks::new()
                            .created(log.recorder("child-created"))
                            .added(log.recorder("child-added")),
                    ),
            )
            .build()
    }

    let markup = "<ul id='list'><li id='x'>x</li></ul>";
    let present = Log::default();
    let mut upfront = Engine::from_html(&format!("<main id='main'>{markup}</main>"))?;
    upfront.register("ul", &nested_config(&present))?;

    let inserted = Log::default();
    let mut later = Engine::from_html("<main id='main'></main>")?;
    later.register("ul", &nested_config(&inserted))?;
    assert!(inserted.entries().is_empty());
    let main = node(&later, "main");
    later.document_mut().set_inner_html(main, markup)?;
    later.flush()?;

    assert_eq!(
        present.entries(),
        vec!["child-created:#x", "child-added:#x", "created:#list", "added:#list"]
    );
    assert_eq!(inserted.entries(), present.entries());
    Ok(())
}

#[test]
fn handler_inserting_matching_elements_binds_them_in_the_same_flush() -> Result<()> {
    let mut engine = Engine::from_html("<ul id='list'></ul><button id='add'>add</button>")?;
    let log = Log::default();
    engine.register("li", &lifecycle_config(&log))?;
    let add = Config::builder()
        .events(Events::new().on("click", |engine, _call| {
            let list = engine
                .document()
                .by_id("list")
                .ok_or_else(|| Error::handler("list missing"))?;
            let dom = engine.document_mut();
            let count = dom.child_elements(list).len();
            let li = dom.create_element_with_attrs("li", [("id", format!("n{count}").as_str())]);
            dom.append_child(list, li)
        }))
        .build();
    engine.register("#add", &add)?;

    let button = node(&engine, "add");
    engine.click(button)?;
    engine.click(button)?;
    assert_eq!(
        log.entries(),
        vec!["created:#n0", "added:#n0", "created:#n1", "added:#n1"]
    );
    Ok(())
}

#[test]
fn registration_inside_a_flush_does_not_double_announce() -> Result<()> {
    let mut engine = Engine::from_html("<div id='host'></div>")?;
    let log = Log::default();
    let late = lifecycle_config(&log);
    let registrar = Config::builder()
        .callbacks(Callbacks::new().added(move |engine, _call| {
            engine.register("p.late", &late)
        }))
        .build();
    engine.register("section", &registrar)?;

    let host = node(&engine, "host");
    engine
        .document_mut()
        .set_inner_html(host, "<section><p id='p' class='late'></p></section>")?;
    engine.flush()?;

    assert_eq!(log.entries(), vec!["created:#p", "added:#p"]);
    Ok(())
}

#[test]
fn register_node_binds_element_and_fragment_children() -> Result<()> {
    let mut engine = Engine::from_html("<div id='host'><p id='p'></p></div>")?;
    let log = Log::default();
    let config = lifecycle_config(&log);

    let p = node(&engine, "p");
    engine.register(p, &config)?;
    assert_eq!(log.entries(), vec!["created:#p", "added:#p"]);
    assert_eq!(engine.registration_count(), 0);

    let fragment = engine
        .document_mut()
        .create_fragment_from_html("<span id='s1'></span>text<span id='s2'></span>")?;
    engine.register(fragment, &config)?;
    assert_eq!(
        log.entries(),
        vec![
            "created:#p",
            "added:#p",
            "created:#s1",
            "added:#s1",
            "created:#s2",
            "added:#s2"
        ]
    );

    let text = engine.document_mut().create_text("loose");
    engine.register(text, &config)?;
    assert_eq!(log.entries().len(), 6);
    Ok(())
}

#[test]
fn data_factory_and_shared_data() -> Result<()> {
    let mut engine = Engine::from_html("<i id='one'></i><i id='two'></i>")?;
    let per_element = Config::builder()
        .data_factory(|dom, node| {
            let mut record = Record::new();
            record.insert("label".into(), Value::from(dom.attr(node, "id")));
            record
        })
        .build();
    let mut seed = Record::new();
    seed.insert("hits".into(), Value::from(0));
    let shared = Config::builder().shared_data(seed).build();
    engine.register("i", &per_element)?;
    engine.register("i", &shared)?;

    let one = node(&engine, "one");
    let two = node(&engine, "two");
    let label = |node| {
        engine
            .context_for(node, &per_element)
            .expect("bound")
            .get("label")
    };
    assert_eq!(label(one), Value::from("one"));
    assert_eq!(label(two), Value::from("two"));

    let first = engine.context_for(one, &shared).expect("bound");
    let second = engine.context_for(two, &shared).expect("bound");
    first.set_shared("hits", 2);
    assert_eq!(second.get("hits"), Value::from(2));
    first.set("hits", 5);
    assert_eq!(first.get("hits"), Value::from(5));
    assert_eq!(second.get("hits"), Value::from(2));
    Ok(())
}

#[test]
fn removing_a_subtree_fires_removed_for_every_bound_descendant() -> Result<()> {
    let mut engine = Engine::from_html(
        "<section id='s'><ul id='list'><li id='a'></li><li id='b'></li></ul></section>",
    )?;
    let log = Log::default();
    let config = lifecycle_config(&log);
    engine.register("ul, li", &config)?;
    log.clear();

    let section = node(&engine, "s");
    engine.document_mut().remove_node(section)?;
    engine.flush()?;
    assert_eq!(log.entries(), vec!["removed:#list", "removed:#a", "removed:#b"]);
    Ok(())
}

#[test]
fn failing_callback_does_not_drop_the_rest_of_its_batch() -> Result<()> {
    let mut engine = Engine::from_html("<ul id='list'><li id='old'>old</li></ul>")?;
    let log = Log::default();
    let seen = log.clone();
    let config = Config::builder()
        .callbacks(
            Callbacks::new()
                .created(move |engine, call| {
                    let label = engine.document().node_label(call.element);
                    if label == "#bad" {
                        return Err(Error::handler("boom"));
                    }
                    seen.push(format!("created:{label}"));
                    Ok(())
                })
                .removed(log.recorder("removed")),
        )
        .build();
    engine.register("li", &config)?;

    let list = node(&engine, "list");
    let old = node(&engine, "old");
    let dom = engine.document_mut();
    let bad = dom.create_element_with_attrs("li", [("id", "bad")]);
    let good = dom.create_element_with_attrs("li", [("id", "good")]);
    dom.append_child(list, bad)?;
    dom.append_child(list, good)?;
    dom.remove_node(old)?;

    assert_eq!(engine.flush(), Err(Error::handler("boom")));
    assert_eq!(
        log.entries(),
        vec!["created:#old", "created:#good", "removed:#old"]
    );
    assert!(engine.is_bound(good));
    assert!(!engine.is_bound(bad));
    assert!(!engine.is_bound(old));
    assert_eq!(engine.document().pending_mutations(), 0);
    engine.flush()?;
    Ok(())
}

#[test]
fn failed_setup_leaves_the_element_unbound_for_a_retry() -> Result<()> {
    let mut engine = Engine::from_html("<ul id='list'><li id='a'>a</li></ul>")?;
    let log = Log::default();
    let attempts = Rc::new(Cell::new(0));
    let counter = attempts.clone();
    let config = Config::builder()
        .events(
            Events::new()
                .on("click", log.recorder("click"))
                .child("span", Events::new().on("click", log.recorder("span"))),
        )
        .callbacks(Callbacks::new().created(move |_, _| {
            counter.set(counter.get() + 1);
            if counter.get() == 1 {
                return Err(Error::handler("not yet"));
            }
            Ok(())
        }))
        .build();

    assert_eq!(engine.register("ul", &config), Err(Error::handler("not yet")));
    let list = node(&engine, "list");
    assert!(!engine.is_bound(list));
    assert_eq!(engine.listener_count(list, "click"), 0);
    assert_eq!(engine.child_registration_count(), 0);
    assert_eq!(engine.registered_selectors(), vec!["ul"]);
    let logs = engine.take_trace_logs();
    assert!(logs.iter().any(|line| line.starts_with("[bind] setup failed on #list")));

    engine.rescan(list)?;
    assert_eq!(attempts.get(), 2);
    assert_eq!(engine.contexts(list).len(), 1);
    assert_eq!(engine.listener_count(list, "click"), 1);
    assert_eq!(engine.child_registration_count(), 1);
    engine.click(list)?;
    assert_eq!(log.entries(), vec!["click:#list"]);
    Ok(())
}

#[test]
fn building_a_subtree_step_by_step_announces_added_once() -> Result<()> {
    let mut engine = Engine::from_html("<div id='host'></div>")?;
    let log = Log::default();
    engine.register("li", &lifecycle_config(&log))?;

    let host = node(&engine, "host");
    let dom = engine.document_mut();
    let ul = dom.create_element("ul");
    dom.append_child(host, ul)?;
    let li = dom.create_element_with_attrs("li", [("id", "x")]);
    dom.append_child(ul, li)?;
    engine.flush()?;
    assert_eq!(log.entries(), vec!["created:#x", "added:#x"]);

    engine.rescan(li)?;
    assert_eq!(log.entries(), vec!["created:#x", "added:#x", "added:#x"]);
    Ok(())
}
