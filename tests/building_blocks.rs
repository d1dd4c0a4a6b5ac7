use std::collections::BTreeMap;

use tw_forms::{
    Constraint, ErrorMap, Observer, RenderSnapshot, Result, ServerValidator, is_field_visible,
    map_server_error, parse_fragment, should_rerender,
};

#[test]
fn render_snapshots_compare_every_component() {
    let mut errors = ErrorMap::new();
    errors.insert(Constraint::ValueMissing, "Required".to_string());
    let shown = RenderSnapshot::new(Constraint::ValueMissing.bit(), &errors, false);

    assert!(!should_rerender(&shown, &shown.clone()));
    assert!(should_rerender(&RenderSnapshot::default(), &shown));

    let reworded = {
        let mut errors = errors.clone();
        errors.insert(Constraint::ValueMissing, "Please fill in".to_string());
        RenderSnapshot::new(Constraint::ValueMissing.bit(), &errors, false)
    };
    assert!(should_rerender(&shown, &reworded));

    let pristine = RenderSnapshot::new(Constraint::ValueMissing.bit(), &errors, true);
    assert!(should_rerender(&shown, &pristine));

    // A seeded snapshot always gives way to the first real render.
    let seeded = RenderSnapshot::seeded(0);
    assert!(should_rerender(&seeded, &RenderSnapshot::new(0, &ErrorMap::new(), true)));
}

#[test]
fn error_string_serializes_constraint_names() {
    let mut errors = ErrorMap::new();
    errors.insert(Constraint::TooShort, "Short".to_string());
    errors.insert(Constraint::PatternMismatch, "Format".to_string());
    let snapshot = RenderSnapshot::new(0, &errors, false);
    assert_eq!(
        snapshot.error_string,
        r#"{"patternMismatch":"Format","tooShort":"Short"}"#
    );
}

#[test]
fn observer_dispatches_rule_by_rule_in_tree_order() -> Result<()> {
    let dom = parse_fragment(
        r#"
        <section id='root'>
          <input id='a' class='field'>
          <div class='group'><input id='b' class='field'></div>
        </section>
        "#,
    )?;
    let mut observer: Observer<Vec<String>> = Observer::new();
    observer.register(".field", |log, node| {
        log.push(format!("field:{}", node.index()));
        Ok(())
    })?;
    observer.register(".group", |log, _| {
        log.push("group".to_string());
        Ok(())
    })?;

    let dispatches = observer.scan(&dom)?;
    assert_eq!(
        dispatches
            .iter()
            .map(|dispatch| dispatch.selector.as_str())
            .collect::<Vec<_>>(),
        vec![".field", ".field", ".group"]
    );

    let mut log = Vec::new();
    for dispatch in dispatches {
        (dispatch.handler)(&mut log, dispatch.node)?;
    }
    assert_eq!(log.len(), 3);
    assert_eq!(log[2], "group");

    let root = dom.by_id("root").into_iter().collect::<Vec<_>>();
    assert!(observer.notify_inserted(&dom, &root)?.is_empty());
    Ok(())
}

#[test]
fn visibility_reads_inline_state_up_to_the_body() -> Result<()> {
    let dom = parse_fragment(
        r#"
        <html><body style='display: none'>
          <div class='hidden'><input id='classed'></div>
          <div hidden><input id='attr'></div>
          <fieldset class='powermail_fieldset' style='display: none'><input id='step'></fieldset>
          <fieldset class='powermail_fieldset'><input id='shown'></fieldset>
          <input id='self' style='display:none'>
        </body></html>
        "#,
    )?;
    let visible = |id: &str| {
        dom.by_id(id)
            .map(|node| is_field_visible(&dom, node, "powermail_fieldset"))
    };
    assert_eq!(visible("classed"), Some(false));
    assert_eq!(visible("attr"), Some(false));
    assert_eq!(visible("step"), Some(false));
    assert_eq!(visible("self"), Some(false));
    // The body itself is not inspected.
    assert_eq!(visible("shown"), Some(true));
    Ok(())
}

#[test]
fn mapped_server_errors_serialize_for_the_frontend() -> serde_json::Result<()> {
    let mapped = map_server_error(1_221_559_976, "Not an e-mail address", &[]);
    let json = serde_json::to_value(&mapped)?;
    assert_eq!(json["code"], 1_580_509_080);
    assert_eq!(json["message"], "Not an e-mail address");
    assert_eq!(json["constraint"], "typeMismatch");

    let codes: BTreeMap<Constraint, Vec<u32>> = tw_forms::inverse_map(ServerValidator::NotEmpty);
    assert_eq!(codes.len(), 1);
    assert_eq!(codes[&Constraint::ValueMissing].len(), 4);
    Ok(())
}
