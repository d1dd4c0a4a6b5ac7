use super::*;

fn single_field(attrs: &str) -> String {
    format!(
        r#"
        <form id='f' novalidate>
          <div class='FormField' id='wrapper'>
            <input id='field' name='field' class='FormField__input' aria-errormessage='field-error' {attrs}>
            <div id='field-error' hidden></div>
          </div>
        </form>
        "#
    )
}

#[test]
fn pristine_fields_stay_silent_unless_forced() -> Result<()> {
    let mut runtime = FormsRuntime::from_html(&single_field("required"))?;
    assert!(runtime.field("#field")?.pristine());

    let errors = runtime.validate_field("#field", true, false)?;
    assert!(errors.is_empty());
    runtime.assert_count("#field-error [data-constraint]", 0)?;

    let errors = runtime.validate_field("#field", true, true)?;
    assert_eq!(errors.keys().copied().collect::<Vec<_>>(), vec![Constraint::ValueMissing]);
    runtime.assert_count("#field-error [data-constraint]", 1)?;
    // Pristine renders neither scroll nor notify the form.
    assert!(runtime.scroll_log().is_empty());
    assert_eq!(runtime.pending_microtasks(), 0);
    Ok(())
}

#[test]
fn set_pristine_clears_rendered_errors() -> Result<()> {
    let mut runtime = FormsRuntime::from_html(&single_field("required"))?;
    runtime.set_pristine("#field", false)?;
    runtime.validate_field("#field", true, false)?;
    runtime.assert_exists("#field-error [data-constraint='valueMissing']")?;
    runtime.assert_class("#wrapper", "FormField--has-error")?;

    runtime.set_pristine("#field", true)?;
    runtime.assert_count("#field-error [data-constraint]", 0)?;
    runtime.assert_attr("#field-error", "hidden", "hidden")?;
    runtime.assert_attr("#field", "aria-invalid", "false")?;
    runtime.assert_no_class("#wrapper", "FormField--has-error")?;
    assert!(runtime.validate_field("#field", true, false)?.is_empty());
    Ok(())
}

#[test]
fn revalidating_unchanged_input_writes_nothing() -> Result<()> {
    let mut runtime = FormsRuntime::from_html(&single_field("required"))?;
    runtime.set_pristine("#field", false)?;
    let first = runtime.validate_field("#field", true, false)?;
    let writes = runtime.dom_write_count();

    let second = runtime.validate_field("#field", true, false)?;
    assert_eq!(first, second);
    assert_eq!(runtime.dom_write_count(), writes);
    assert_eq!(runtime.field("#field")?.last_constraints(), Constraint::ValueMissing.bit());
    Ok(())
}

#[test]
fn value_missing_is_reported_alone() -> Result<()> {
    let mut runtime = FormsRuntime::from_html(&single_field(
        "required pattern='[0-9]+' minlength='3' data-powermail-length='[3,9]'",
    ))?;
    let errors = runtime.validate_field("#field", true, true)?;
    assert_eq!(errors.len(), 1);
    assert!(errors.contains_key(&Constraint::ValueMissing));
    Ok(())
}

#[test]
fn length_rule_is_suppressed_by_native_too_short() -> Result<()> {
    let mut runtime = FormsRuntime::from_html(&single_field(
        "minlength='5' data-powermail-length='[5,10]' value='abc'",
    ))?;
    let errors = runtime.validate_field("#field", true, true)?;
    assert_eq!(errors.keys().copied().collect::<Vec<_>>(), vec![Constraint::TooShort]);
    Ok(())
}

#[test]
fn custom_rules_share_the_custom_error_bucket() -> Result<()> {
    let mut runtime = FormsRuntime::from_html(&single_field(
        "data-powermail-length='[5,10]' data-powermail-length-message='Between 5 and 10' value='abc'",
    ))?;
    let errors = runtime.validate_field("#field", true, true)?;
    assert_eq!(
        errors.get(&Constraint::CustomError).map(String::as_str),
        Some("Between 5 and 10")
    );
    runtime.assert_text("#field-error [data-constraint='customError']", "Between 5 and 10")?;

    let mut fallback = FormsRuntime::from_html(&single_field("data-powermail-length='[5,10]' value='abc'"))?;
    let errors = fallback.validate_field("#field", true, true)?;
    assert_eq!(
        errors.get(&Constraint::CustomError).map(String::as_str),
        Some("Invalid input (length)")
    );
    Ok(())
}

#[test]
fn message_precedence_prefers_specific_overrides() -> Result<()> {
    let cases = [
        (
            "type='email' value='x' data-powermail-typemismatch-message='Specific' data-powermail-error-message='Generic' data-errormsg-typemismatch='Captured'",
            "Specific",
        ),
        (
            "type='email' value='x' data-powermail-error-message='Generic' data-errormsg-typemismatch='Captured'",
            "Generic",
        ),
        ("type='email' value='x' data-errormsg-typemismatch='Captured'", "Captured"),
        ("type='email' value='x'", "Please enter an email address."),
    ];
    for (attrs, expected) in cases {
        let mut runtime = FormsRuntime::from_html(&single_field(attrs))?;
        let errors = runtime.validate_field("#field", true, true)?;
        assert_eq!(
            errors.get(&Constraint::TypeMismatch).map(String::as_str),
            Some(expected),
            "attributes: {attrs}"
        );
    }
    Ok(())
}

#[test]
fn value_missing_ignores_the_generic_message() -> Result<()> {
    let mut runtime = FormsRuntime::from_html(&single_field(
        "required data-powermail-error-message='Generic' data-errormsgvaluemissing='Server says required'",
    ))?;
    let errors = runtime.validate_field("#field", true, true)?;
    assert_eq!(
        errors.get(&Constraint::ValueMissing).map(String::as_str),
        Some("Server says required")
    );

    let mut runtime = FormsRuntime::from_html(&single_field(
        "required data-powermail-required-message='Tell us' data-errormsgvaluemissing='Server says required'",
    ))?;
    let errors = runtime.validate_field("#field", true, true)?;
    assert_eq!(errors.get(&Constraint::ValueMissing).map(String::as_str), Some("Tell us"));
    Ok(())
}

#[test]
fn captured_messages_read_both_attribute_spellings() -> Result<()> {
    let runtime = FormsRuntime::from_html(&single_field(
        "data-errormsg-valuemissing='Missing' data-errormsgpatternmismatch='Format'",
    ))?;
    let captured = runtime.field("#field")?.captured_messages();
    assert_eq!(captured.get(&Constraint::ValueMissing).map(String::as_str), Some("Missing"));
    assert_eq!(captured.get(&Constraint::PatternMismatch).map(String::as_str), Some("Format"));
    Ok(())
}

#[test]
fn server_rendered_constraints_seed_the_snapshot() -> Result<()> {
    let runtime = FormsRuntime::from_html(
        r#"
        <form>
          <div class='FormField'>
            <input id='field' class='FormField__input' required aria-errormessage='field-error'>
            <div id='field-error'><span data-constraint='valueMissing'>Required</span><span data-constraint='tooLong'>Long</span></div>
          </div>
        </form>
        "#,
    )?;
    assert_eq!(
        runtime.field("#field")?.last_constraints(),
        Constraint::ValueMissing.bit() + Constraint::TooLong.bit()
    );
    runtime.assert_text("#field-error", "RequiredLong")?;
    Ok(())
}

#[test]
fn field_without_error_container_validates_without_rendering() -> Result<()> {
    let mut runtime = FormsRuntime::from_html(
        "<form><div class='FormField'><input id='bare' class='FormField__input' required></div></form>",
    )?;
    let writes = runtime.dom_write_count();
    let errors = runtime.validate_field("#bare", true, true)?;
    assert!(errors.contains_key(&Constraint::ValueMissing));
    assert_eq!(runtime.dom_write_count(), writes);
    assert!(runtime.field("#bare")?.error_bag().is_none());
    Ok(())
}

#[test]
fn in_flight_result_short_circuits_reentrant_validation() -> Result<()> {
    let mut runtime = FormsRuntime::from_html(&single_field("required"))?;
    let mut pending = ErrorMap::new();
    pending.insert(Constraint::PatternMismatch, "pending".to_string());
    runtime.field_mut("#field")?.set_in_flight(Some(pending.clone()));

    let writes = runtime.dom_write_count();
    assert_eq!(runtime.validate_field("#field", true, true)?, pending);
    assert_eq!(runtime.dom_write_count(), writes);

    runtime.field_mut("#field")?.set_in_flight(None);
    let errors = runtime.validate_field("#field", true, true)?;
    assert!(errors.contains_key(&Constraint::ValueMissing));
    Ok(())
}

#[test]
fn show_errors_false_computes_without_rendering() -> Result<()> {
    let mut runtime = FormsRuntime::from_html(&single_field("required"))?;
    let writes = runtime.dom_write_count();
    let errors = runtime.validate_field("#field", false, true)?;
    assert!(errors.contains_key(&Constraint::ValueMissing));
    assert_eq!(runtime.dom_write_count(), writes);
    Ok(())
}

const RADIO_GROUP: &str = r#"
    <form id='f' class='Form--custom-validation'>
      <nav class='Form__error-navigation' hidden><ol class='Form__error-summary'></ol></nav>
      <div class='FormField' id='color-wrapper'>
        <input type='radio' id='red' name='color' value='red' class='FormField__input FormField__group-element' required aria-errormessage='color-error'>
        <input type='radio' id='blue' name='color' value='blue' class='FormField__input FormField__group-element' aria-errormessage='color-error'>
        <input type='radio' id='green' name='color' value='green' class='FormField__input FormField__group-element' aria-errormessage='color-error'>
        <div id='color-error' hidden></div>
      </div>
      <button id='send'>Send</button>
    </form>
    "#;

#[test]
fn first_group_member_becomes_primary() -> Result<()> {
    let runtime = FormsRuntime::from_html(RADIO_GROUP)?;
    let red = runtime.field("#red")?.element();
    assert_eq!(runtime.field("#red")?.group(), GroupRole::Primary);
    assert_eq!(runtime.field("#blue")?.group(), GroupRole::Member { primary: red });
    assert_eq!(runtime.field("#green")?.representative(), red);
    assert_eq!(runtime.field("#red")?.kind(), FieldKind::RadioGroup);

    let validation = runtime
        .form_validation("#f")?
        .ok_or_else(|| Error::SelectorNotFound("#f".into()))?;
    assert_eq!(validation.field_ids().collect::<Vec<_>>(), vec!["red"]);
    Ok(())
}

#[test]
fn group_is_satisfied_by_any_checked_member() -> Result<()> {
    let mut runtime = FormsRuntime::from_html(RADIO_GROUP)?;
    assert!(runtime.validate_group("#green")?.value_missing);

    runtime.set_checked("#green", true)?;
    assert!(!runtime.validate_group("#red")?.value_missing);
    assert!(!runtime.validate_group("#blue")?.value_missing);

    runtime.set_checked("#blue", true)?;
    assert!(!runtime.dom().checked(runtime.field("#green")?.element()));
    assert!(!runtime.validate_group("#red")?.value_missing);
    Ok(())
}

#[test]
fn member_events_validate_the_primary_after_submit() -> Result<()> {
    let mut runtime = FormsRuntime::from_html(RADIO_GROUP)?;
    runtime.click("#send")?;
    assert_eq!(runtime.last_submit(), Some(SubmitOutcome::Prevented));
    runtime.assert_text("#color-error [data-constraint='valueMissing']", "Please select one of these options.")?;
    runtime.assert_attr("#red", "aria-invalid", "true")?;

    runtime.click("#blue")?;
    runtime.assert_count("#color-error [data-constraint]", 0)?;
    runtime.assert_attr("#red", "aria-invalid", "false")?;
    assert!(runtime.dom().checked(runtime.field("#blue")?.element()));
    Ok(())
}

#[test]
fn checkbox_group_requires_one_checked_member() -> Result<()> {
    let mut runtime = FormsRuntime::from_html(
        r#"
        <form id='f'>
          <div class='FormField'>
            <input type='checkbox' id='a' name='topics[]' class='FormField__input FormMultiCheckbox' aria-errormessage='topics-error'>
            <input type='checkbox' id='b' name='topics[]' class='FormField__input FormMultiCheckbox' aria-errormessage='topics-error'>
            <div id='topics-error' hidden></div>
          </div>
        </form>
        "#,
    )?;
    assert_eq!(runtime.field("#a")?.kind(), FieldKind::CheckboxGroup);
    let errors = runtime.validate_field("#b", true, true)?;
    assert!(errors.contains_key(&Constraint::ValueMissing));

    runtime.set_checked("#b", true)?;
    assert!(runtime.validate_field("#a", true, true)?.is_empty());
    runtime.assert_count("#topics-error [data-constraint]", 0)?;
    Ok(())
}
