use std::cell::Cell;
use std::rc::Rc;

use super::*;

#[test]
fn inserted_fields_are_enhanced_and_tracked() -> Result<()> {
    let mut runtime = FormsRuntime::from_html(CONTACT_FORM)?;
    assert_eq!(runtime.field_count(), 1);

    runtime.insert_html(
        "#contact",
        r#"
        <div class='FormField' id='phone-wrapper'>
          <input id='phone' name='phone' type='tel' class='FormField__input' required aria-errormessage='phone-error'>
          <div id='phone-error' hidden></div>
        </div>
        "#,
    )?;
    assert_eq!(runtime.field_count(), 2);
    assert!(runtime.field("#phone")?.pristine());
    let ids: Vec<&str> = runtime
        .form_validation("#contact")?
        .map(|validation| validation.field_ids().collect())
        .unwrap_or_default();
    assert_eq!(ids, vec!["name", "phone"]);

    assert_eq!(runtime.submit("#contact")?, SubmitOutcome::Prevented);
    runtime.assert_count(".Form__error-summary > li", 2)?;
    runtime.assert_exists("#phone-error [data-constraint='valueMissing']")?;
    assert_eq!(runtime.title(), "(2 errors) Contact");
    Ok(())
}

#[test]
fn enhancing_twice_keeps_one_field() -> Result<()> {
    let mut runtime = FormsRuntime::from_html(CONTACT_FORM)?;
    runtime.enhance("#name")?;
    runtime.enhance("#name")?;
    assert_eq!(runtime.field_count(), 1);

    runtime.enhance("#send")?;
    assert_eq!(runtime.field_count(), 2);
    assert_eq!(runtime.field("#send")?.kind(), FieldKind::Input);
    Ok(())
}

#[test]
fn custom_rules_see_existing_and_inserted_nodes_once() -> Result<()> {
    let mut runtime = FormsRuntime::from_html("<div id='host'><span class='Widget'></span></div>")?;
    let seen = Rc::new(Cell::new(0usize));
    let counter = Rc::clone(&seen);
    runtime.observe(".Widget", move |_, _| {
        counter.set(counter.get() + 1);
        Ok(())
    })?;
    assert_eq!(seen.get(), 1);
    assert_eq!(runtime.observer_rule_count(), 2);

    runtime.insert_html("#host", "<p class='Widget'><em class='Widget'></em></p>")?;
    assert_eq!(seen.get(), 3);

    runtime.flush()?;
    assert_eq!(seen.get(), 3);
    Ok(())
}

#[test]
fn observe_rejects_malformed_selectors() -> Result<()> {
    let mut runtime = FormsRuntime::from_html("<p></p>")?;
    match runtime.observe("[broken", |_, _| Ok(())) {
        Err(Error::UnsupportedSelector(_)) => {}
        other => panic!("expected an unsupported selector, got {other:?}"),
    }
    assert_eq!(runtime.observer_rule_count(), 1);
    Ok(())
}

#[test]
fn handler_errors_propagate_to_the_action() -> Result<()> {
    let mut runtime = FormsRuntime::from_html("<div id='host'></div>")?;
    runtime.observe(".Trap", |_, _| Err(Error::Dom("trap sprung".into())))?;
    match runtime.insert_html("#host", "<i class='Trap'></i>") {
        Err(Error::Dom(message)) => assert_eq!(message, "trap sprung"),
        other => panic!("expected the handler error, got {other:?}"),
    }
    Ok(())
}

#[test]
fn removed_fields_are_forgotten() -> Result<()> {
    let mut runtime = FormsRuntime::from_html(CONTACT_FORM)?;
    runtime.remove("#name-wrapper")?;
    assert_eq!(runtime.field_count(), 0);
    match runtime.field("#name") {
        Err(Error::SelectorNotFound(selector)) => assert_eq!(selector, "#name"),
        other => panic!("expected the field to be gone, got {other:?}"),
    }

    assert_eq!(runtime.submit("#contact")?, SubmitOutcome::Submitted);
    runtime.assert_count(".Form__error-summary > li", 0)?;
    assert_eq!(runtime.title(), "Contact");
    Ok(())
}

#[test]
fn removing_a_form_drops_its_controllers() -> Result<()> {
    let mut runtime = FormsRuntime::from_html(
        r#"
        <form id='contact' class='Form--custom-validation'>
          <div class='FormField'><input id='name' class='FormField__input' required></div>
        </form>
        <div id='rest'></div>
        "#,
    )?;
    runtime.remove("#contact")?;
    assert_eq!(runtime.field_count(), 0);
    runtime.assert_missing("form")?;
    runtime.assert_exists("#rest")?;
    Ok(())
}

#[test]
fn single_page_forms_wait_for_the_first_submit() -> Result<()> {
    let mut runtime = FormsRuntime::from_html(CONTACT_FORM)?;
    runtime.enable_trace(true);

    runtime.type_text("#name", "")?;
    runtime.assert_count("#name-error [data-constraint]", 0)?;
    assert!(!runtime.is_form_dirty("#contact")?);
    let logs = runtime.take_trace_logs();
    assert!(logs.iter().any(|line| line == "[event] input target=input#name gated"), "{logs:?}");

    runtime.submit("#contact")?;
    assert!(runtime.is_form_dirty("#contact")?);
    runtime.type_text("#name", "J")?;
    runtime.type_text("#name", "")?;
    runtime.assert_exists("#name-error [data-constraint='valueMissing']")?;
    Ok(())
}

#[test]
fn fields_inserted_after_submit_validate_live() -> Result<()> {
    let mut runtime = FormsRuntime::from_html(CONTACT_FORM)?;
    runtime.submit("#contact")?;
    runtime.insert_html(
        "#contact",
        r#"
        <div class='FormField'>
          <input id='late' name='late' class='FormField__input' required aria-errormessage='late-error'>
          <div id='late-error' hidden></div>
        </div>
        "#,
    )?;
    assert!(!runtime.field("#late")?.pristine());

    runtime.type_text("#late", "x")?;
    runtime.type_text("#late", "")?;
    runtime.assert_exists("#late-error [data-constraint='valueMissing']")?;
    Ok(())
}

#[test]
fn fields_inserted_before_submit_stay_quiet() -> Result<()> {
    let mut runtime = FormsRuntime::from_html(CONTACT_FORM)?;
    runtime.insert_html(
        "#contact",
        "<input id='early' class='FormField__input' required aria-errormessage='name-error'>",
    )?;
    assert!(runtime.field("#early")?.pristine());
    runtime.type_text("#early", "")?;
    runtime.assert_count("#name-error [data-constraint]", 0)?;
    Ok(())
}

#[test]
fn fields_outside_forms_skip_the_form_gate() -> Result<()> {
    let mut runtime = FormsRuntime::from_html(
        r#"
        <div class='FormField'>
          <input id='loose' class='FormField__input' required aria-errormessage='loose-error'>
          <div id='loose-error' hidden></div>
        </div>
        "#,
    )?;
    runtime.enable_trace(true);
    runtime.type_text("#loose", "")?;
    let logs = runtime.take_trace_logs();
    assert!(!logs.iter().any(|line| line.ends_with("gated")), "{logs:?}");
    runtime.assert_count("#loose-error [data-constraint]", 0)?;

    runtime.set_pristine("#loose", false)?;
    runtime.type_text("#loose", "")?;
    runtime.assert_exists("#loose-error [data-constraint='valueMissing']")?;
    Ok(())
}

#[test]
fn removed_nodes_leave_no_observer_bookkeeping() -> Result<()> {
    let mut runtime = FormsRuntime::from_html(CONTACT_FORM)?;
    let before = runtime.observer_dispatched_count();
    runtime.insert_html(
        "#contact",
        "<div id='extra' class='FormField'><input id='extra-input' class='FormField__input'></div>",
    )?;
    assert!(runtime.observer_dispatched_count() > before);

    runtime.remove("#extra")?;
    assert_eq!(runtime.observer_dispatched_count(), before);
    assert_eq!(runtime.field_count(), 1);
    Ok(())
}

#[test]
fn scroll_log_keeps_the_most_recent_targets() -> Result<()> {
    let config = FormsConfig::from_json(r#"{ "scroll_log_limit": 1 }"#)?;
    let mut runtime = FormsRuntime::from_html_with_config(CONTACT_FORM, config)?;
    runtime.click("#send")?;
    runtime.type_text("#name", "J")?;
    runtime.type_text("#name", "")?;
    assert_eq!(runtime.scroll_log().len(), 1);

    match FormsConfig::from_json(r#"{ "scroll_log_limit": 0 }"#) {
        Err(Error::Config(message)) => assert!(message.contains("scroll_log_limit")),
        other => panic!("expected a config error, got {other:?}"),
    }
    Ok(())
}

#[test]
fn actions_reject_the_wrong_kind_of_element() -> Result<()> {
    let mut runtime = FormsRuntime::from_html(
        r#"
        <form id='f'>
          <input id='box' type='checkbox'>
          <input id='text'>
          <select id='pick'><option value='a'>A</option><option value='b'>B</option></select>
          <input id='off' disabled value='keep'>
        </form>
        "#,
    )?;
    assert!(matches!(runtime.type_text("#box", "x"), Err(Error::TypeMismatch { .. })));
    assert!(matches!(runtime.set_checked("#text", true), Err(Error::TypeMismatch { .. })));
    assert!(matches!(runtime.select_value("#text", "a"), Err(Error::TypeMismatch { .. })));
    assert!(matches!(
        runtime.set_files("#text", vec![FileSpec::new("a.txt", 1)]),
        Err(Error::TypeMismatch { .. })
    ));
    assert!(matches!(runtime.validate_field("#text", true, true), Err(Error::TypeMismatch { .. })));
    assert!(matches!(runtime.click("#missing"), Err(Error::SelectorNotFound(_))));

    runtime.type_text("#off", "changed")?;
    assert_eq!(runtime.dom().value(runtime.select_one("#off")?), "keep");
    runtime.select_value("#pick", "b")?;
    assert_eq!(runtime.dom().value(runtime.select_one("#pick")?), "b");
    Ok(())
}

#[test]
fn trace_log_keeps_the_most_recent_lines() -> Result<()> {
    let mut runtime = FormsRuntime::from_html(CONTACT_FORM)?;
    assert!(runtime.take_trace_logs().is_empty());

    runtime.enable_trace(true);
    runtime.set_trace_log_limit(2)?;
    runtime.click("#send")?;
    let logs = runtime.take_trace_logs();
    assert_eq!(logs.len(), 2);
    assert_eq!(
        logs.last().map(String::as_str),
        Some("[form] summary form#contact errors=1")
    );
    assert!(runtime.take_trace_logs().is_empty());

    match runtime.set_trace_log_limit(0) {
        Err(Error::Config(message)) => assert!(message.contains("at least 1")),
        other => panic!("expected a config error, got {other:?}"),
    }
    Ok(())
}

#[test]
fn load_trace_is_recorded_when_enabled_in_config() -> Result<()> {
    let config = FormsConfig::from_json(r#"{ "trace": { "enabled": true } }"#)?;
    let mut runtime = FormsRuntime::from_html_with_config(CONTACT_FORM, config)?;
    let logs = runtime.take_trace_logs();
    assert!(logs.iter().any(|line| line.starts_with("[field] enhance input#name")));
    assert!(logs.iter().any(|line| line == "[observer] enhance selector=.FormField__input, .FormField__textarea node=input#name"));
    assert!(logs.iter().any(|line| line == "[runtime] loaded fields=1 forms=1"));
    Ok(())
}

#[test]
fn config_is_validated_up_front() {
    assert!(matches!(
        FormsConfig::from_json(r#"{ "no_such_key": 1 }"#),
        Err(Error::Config(_))
    ));
    assert!(matches!(
        FormsConfig::from_json(r#"{ "microtask_step_limit": 0 }"#),
        Err(Error::Config(_))
    ));
    assert!(matches!(
        FormsConfig::from_json(r#"{ "trace": { "log_limit": 0 } }"#),
        Err(Error::Config(_))
    ));
    assert!(matches!(
        FormsConfig::from_json(r#"{ "field_selector": "input[" }"#),
        Err(Error::UnsupportedSelector(_))
    ));

    let config = FormsConfig {
        field_selector: "  ".into(),
        ..FormsConfig::default()
    };
    assert!(matches!(
        FormsRuntime::from_html_with_config("<p></p>", config),
        Err(Error::Config(_))
    ));
}

#[test]
fn custom_vocabulary_drives_enhancement() -> Result<()> {
    let config = FormsConfig::from_json(
        r#"{ "field_selector": ".js-field", "wrapper_class": "field", "has_error_class": "is-invalid" }"#,
    )?;
    let mut runtime = FormsRuntime::from_html_with_config(
        r#"
        <form id='f'>
          <div class='field' id='w'><input id='a' class='js-field' required aria-errormessage='a-error'><p id='a-error' hidden></p></div>
          <input id='b' class='FormField__input' required>
        </form>
        "#,
        config,
    )?;
    assert_eq!(runtime.field_count(), 1);
    runtime.set_pristine("#a", false)?;
    runtime.validate_field("#a", true, false)?;
    runtime.assert_class("#w", "is-invalid")?;
    Ok(())
}

#[test]
fn runaway_microtasks_hit_the_step_limit() -> Result<()> {
    let config = FormsConfig {
        microtask_step_limit: 1,
        ..FormsConfig::default()
    };
    let mut runtime = FormsRuntime::from_html_with_config(CONTACT_FORM, config)?;
    match runtime.submit("#contact") {
        Err(Error::MicrotaskLimitExceeded { limit }) => assert_eq!(limit, 1),
        other => panic!("expected the step limit, got {other:?}"),
    }
    assert_eq!(runtime.pending_microtasks(), 0);
    Ok(())
}

#[test]
fn assertion_failures_carry_a_snippet() -> Result<()> {
    let runtime = FormsRuntime::from_html(CONTACT_FORM)?;
    match runtime.assert_attr("#name", "aria-invalid", "true") {
        Err(Error::AssertionFailed {
            selector,
            actual,
            dom_snippet,
            ..
        }) => {
            assert_eq!(selector, "#name");
            assert_eq!(actual, "no aria-invalid");
            assert!(dom_snippet.starts_with("<input"));
        }
        other => panic!("expected an assertion failure, got {other:?}"),
    }
    assert!(runtime.assert_text("#send", "Send").is_ok());
    assert!(runtime.dump_dom("#name-wrapper")?.contains("id=\"name-error\""));
    Ok(())
}
