use super::*;

mod field_rendering;
mod observer_and_runtime;

const CONTACT_FORM: &str = r#"
    <html>
      <head><title>Contact</title></head>
      <body>
        <form id='contact' class='Form Form--custom-validation' action='/send'>
          <nav id='errors' class='Form__error-navigation' hidden data-title-errors='({0} errors)'>
            <h2 class='Form__error-heading' data-heading-single='%s error' data-heading-multiple='%s errors'></h2>
            <ol class='Form__error-summary'></ol>
          </nav>
          <div class='FormField' id='name-wrapper'>
            <input id='name' name='name' class='FormField__input' required aria-errormessage='name-error'>
            <div id='name-error' hidden></div>
          </div>
          <button id='send' type='submit'>Send</button>
        </form>
      </body>
    </html>
    "#;

#[test]
fn submit_with_missing_value_is_prevented() -> Result<()> {
    let mut runtime = FormsRuntime::from_html(CONTACT_FORM)?;
    runtime.click("#send")?;
    assert_eq!(runtime.last_submit(), Some(SubmitOutcome::Prevented));
    runtime.assert_text("#name-error [data-constraint='valueMissing']", "Please fill out this field.")?;
    runtime.assert_attr("#name", "aria-invalid", "true")?;
    runtime.assert_class("#name-wrapper", "FormField--has-error")?;
    assert_eq!(runtime.title(), "(1 errors) Contact");
    Ok(())
}

#[test]
fn typing_a_value_then_submitting_goes_through() -> Result<()> {
    let mut runtime = FormsRuntime::from_html(CONTACT_FORM)?;
    runtime.click("#send")?;
    runtime.type_text("#name", "Jane")?;
    runtime.assert_attr("#name", "aria-invalid", "false")?;
    runtime.assert_attr("#name-error", "hidden", "hidden")?;

    runtime.click("#send")?;
    assert_eq!(runtime.last_submit(), Some(SubmitOutcome::Submitted));
    assert_eq!(runtime.title(), "Contact");
    runtime.assert_text("title", "Contact")?;
    Ok(())
}
