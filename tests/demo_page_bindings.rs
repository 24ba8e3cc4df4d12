use bindery::{
    Action, Callbacks, Config, Engine, EngineOptions, Document, Events, NodeId, RefSpec, Refs,
    Result, Shortcut, Value,
};

fn by_id(engine: &Engine, id: &str) -> NodeId {
    engine
        .document()
        .by_id(id)
        .unwrap_or_else(|| panic!("missing #{id}"))
}

fn classes(engine: &Engine, node: NodeId) -> String {
    engine.document().attr(node, "class").unwrap_or_default()
}

#[test]
fn burger_toggles_itself_and_its_target() -> Result<()> {
    let mut engine = Engine::from_html(
        "<body>\
           <a id='burger' class='burger' data-target='nav-menu'></a>\
           <div id='nav-menu' class='menu'></div>\
         </body>",
    )?;
    let config = Config::builder()
        .callbacks(Callbacks::new().created(|engine, call| {
            let target = engine
                .document()
                .dataset_get(call.element, "target")
                .and_then(|id| engine.document().by_id(&id));
            call.context.set("burger_target", Value::from(target));
            Ok(())
        }))
        .events(Events::new().on("click", |engine, call| {
            if let Some(target) = call.context.node("burger_target") {
                engine.document_mut().class_toggle(target, "is-active")?;
            }
            engine.document_mut().class_toggle(call.element, "is-active")?;
            Ok(())
        }))
        .build();
    engine.register(".burger", &config)?;

    let burger = by_id(&engine, "burger");
    let menu = by_id(&engine, "nav-menu");
    engine.click(burger)?;
    assert_eq!(classes(&engine, burger), "burger is-active");
    assert_eq!(classes(&engine, menu), "menu is-active");
    engine.click(burger)?;
    assert_eq!(classes(&engine, menu), "menu");
    Ok(())
}

#[test]
fn table_rows_select_without_reaching_the_table() -> Result<()> {
    let mut engine = Engine::from_html(
        "<body>\
           <table id='t'>\
             <thead><tr id='head'><th>name</th></tr></thead>\
             <tbody><tr id='r1'><td>1</td></tr><tr id='r2'><td>2</td></tr></tbody>\
           </table>\
           <button id='warn' class='button is-warning'>!</button>\
         </body>",
    )?;
    let table_clicks = std::rc::Rc::new(std::cell::Cell::new(0));
    let warnings = std::rc::Rc::new(std::cell::Cell::new(0));
    let (table_seen, warn_seen) = (table_clicks.clone(), warnings.clone());
    let config = Config::builder()
        .events(
            Events::new()
                .on("click", move |_, _| {
                    table_seen.set(table_seen.get() + 1);
                    Ok(())
                })
                .child(
                    "tbody tr",
                    Events::new().on("click", |engine, call| {
                        for row in engine.find_all_descendants(call.target, "tr")? {
                            engine.document_mut().class_remove(row, "is-selected")?;
                        }
                        engine.document_mut().class_add(call.element, "is-selected")?;
                        if let Some(event) = call.event {
                            event.stop_propagation();
                        }
                        Ok(())
                    }),
                )
                .child(
                    ":root .button.is-warning",
                    Events::new().on("click", move |_, _| {
                        warn_seen.set(warn_seen.get() + 1);
                        Ok(())
                    }),
                ),
        )
        .build();
    engine.register("table", &config)?;

    let (head, r1, r2) = (by_id(&engine, "head"), by_id(&engine, "r1"), by_id(&engine, "r2"));
    engine.click(r1)?;
    engine.click(r2)?;
    assert!(!engine.document().class_contains(r1, "is-selected"));
    assert!(engine.document().class_contains(r2, "is-selected"));
    assert_eq!(table_clicks.get(), 0);

    engine.click(head)?;
    assert_eq!(table_clicks.get(), 1);
    assert!(!engine.document().class_contains(head, "is-selected"));

    let warn = by_id(&engine, "warn");
    engine.click(warn)?;
    assert_eq!(warnings.get(), 1);
    Ok(())
}

#[test]
fn modal_opens_from_global_trigger_and_closes_from_inside() -> Result<()> {
    let mut engine = Engine::from_html(
        "<body>\
           <button id='open' class='modal-trigger'>open</button>\
           <div id='modal' class='modal'><button id='close' class='modal-close'>x</button></div>\
         </body>",
    )?;
    let config = Config::builder()
        .events(Events::new().group(
            "click",
            Events::new()
                .child(
                    ":root .modal-trigger",
                    Events::new().on("click", |engine, call| {
                        engine.document_mut().class_add(call.target, "is-active")
                    }),
                )
                .child(
                    ".modal-close",
                    Events::new().on("click", |engine, call| {
                        engine.document_mut().class_remove(call.target, "is-active")
                    }),
                ),
        ))
        .build();
    engine.register(".modal", &config)?;

    let (open, close, modal) = (by_id(&engine, "open"), by_id(&engine, "close"), by_id(&engine, "modal"));
    engine.click(open)?;
    assert!(engine.document().class_contains(modal, "is-active"));
    assert!(!engine.document().class_contains(open, "is-active"));
    engine.click(close)?;
    assert!(!engine.document().class_contains(modal, "is-active"));
    Ok(())
}

#[test]
fn switchable_follows_the_select_named_by_its_dataset() -> Result<()> {
    let mut engine = Engine::from_html(
        "<body>\
           <div id='panel' class='switchable' data-target='kind' data-value='b'>\
             <select id='kind'><option value='a'>a</option><option value='b'>b</option></select>\
           </div>\
         </body>",
    )?;
    let config = Config::builder()
        .events(Events::new().child(
            "#{target}",
            Events::new().on("change", |engine, call| {
                let Some(event) = call.event else {
                    return Ok(());
                };
                let chosen = engine.document().value(event.target());
                let wanted = engine.document().dataset_get(call.target, "value");
                if chosen.is_some() && chosen == wanted {
                    engine.document_mut().class_remove(call.target, "is-hidden")
                } else {
                    engine.document_mut().class_add(call.target, "is-hidden")
                }
            }),
        ))
        .build();
    engine.register(".switchable", &config)?;

    let (panel, select) = (by_id(&engine, "panel"), by_id(&engine, "kind"));
    engine.type_text(select, "a")?;
    assert!(engine.document().class_contains(panel, "is-hidden"));
    engine.type_text(select, "b")?;
    assert!(!engine.document().class_contains(panel, "is-hidden"));
    Ok(())
}

#[test]
fn notification_delete_removes_only_its_notification() -> Result<()> {
    let mut engine = Engine::from_html(
        "<body>\
           <div id='n1' class='notification'>one<button id='d1' class='delete'></button></div>\
           <div id='n2' class='notification'>two<button id='d2' class='delete'></button></div>\
         </body>",
    )?;
    let config = Config::builder()
        .events(Events::new().child(
            ".delete",
            Events::new().on("click", |engine, call| {
                engine.document_mut().remove_node(call.target)
            }),
        ))
        .build();
    engine.register(".notification", &config)?;
    assert_eq!(engine.child_registration_count(), 2);

    let (n1, n2, d1) = (by_id(&engine, "n1"), by_id(&engine, "n2"), by_id(&engine, "d1"));
    engine.click(d1)?;
    assert!(!engine.document().is_connected(n1));
    assert!(engine.document().is_connected(n2));
    assert_eq!(engine.child_registration_count(), 1);
    Ok(())
}

#[test]
fn aside_menu_switches_tab_panes_through_refs() -> Result<()> {
    let mut engine = Engine::with_options(
        Document::parse(
            "<body>\
               <aside id='aside'><ul class='menu-list'>\
                 <li><a id='l1' href='#welcome' class='is-active'>welcome</a></li>\
                 <li><a id='l2' href='#usage'>usage</a></li>\
                 <li><a id='l3'>plain</a></li>\
               </ul></aside>\
               <section>\
                 <div id='p1' class='tab-pane is-active' data-ref='welcome'></div>\
                 <div id='p2' class='tab-pane' data-ref='usage'></div>\
               </section>\
             </body>",
        )?,
        EngineOptions {
            debug: true,
            ..EngineOptions::default()
        },
    );

    let config = Config::builder()
        .refs(Refs::Named(vec![
            RefSpec::many("content", ":root .tab-pane"),
            RefSpec::many("menu_items", ".menu-list a"),
        ]))
        .shortcut(
            "click",
            Shortcut::Delegated(vec![(
                ":root .menu-list a".into(),
                Action::named("menu_item_selected"),
            )]),
        )
        .method("menu_item_selected", |engine, call| {
            let Some(event) = call.event else {
                return Ok(());
            };
            let Some(href) = engine.document().attr(event.target(), "href") else {
                return Ok(());
            };
            let short = href.trim_start_matches('#');
            for pane in call.context.refs("content") {
                if engine.document().dataset_get(pane, "ref").as_deref() == Some(short) {
                    engine.document_mut().class_add(pane, "is-active")?;
                } else {
                    engine.document_mut().class_remove(pane, "is-active")?;
                }
            }
            for item in call.context.refs("menu_items") {
                match engine.document().attr(item, "href") {
                    Some(link) if link == href => engine.document_mut().class_add(item, "is-active")?,
                    Some(_) => engine.document_mut().class_remove(item, "is-active")?,
                    None => {}
                }
            }
            Ok(())
        })
        .build();
    engine.register("aside", &config)?;

    let aside = by_id(&engine, "aside");
    let context = engine.context_for(aside, &config).expect("aside bound");
    assert_eq!(context.refs("content").len(), 2);
    assert_eq!(context.refs("menu_items").len(), 3);

    let (l1, l2, l3) = (by_id(&engine, "l1"), by_id(&engine, "l2"), by_id(&engine, "l3"));
    let (p1, p2) = (by_id(&engine, "p1"), by_id(&engine, "p2"));
    engine.click(l2)?;
    assert!(engine.document().class_contains(p2, "is-active"));
    assert!(!engine.document().class_contains(p1, "is-active"));
    assert!(engine.document().class_contains(l2, "is-active"));
    assert!(!engine.document().class_contains(l1, "is-active"));

    engine.click(l3)?;
    assert!(engine.document().class_contains(p2, "is-active"));

    let logs = engine.take_trace_logs();
    assert!(logs.iter().any(|line| line.starts_with("[ref] content <- #p1")));
    Ok(())
}
