use proptest::collection::vec;
use proptest::prelude::*;
use proptest::test_runner::{FileFailurePersistence, TestCaseError, TestCaseResult};
use tw_forms::{Constraint, FormsRuntime, ValidityState, bitmask_of};

const FORMS_PROPTEST_REGRESSION_FILE: &str = "tests/proptest-regressions/forms_property_test.txt";
const DEFAULT_FORMS_PROPTEST_CASES: u32 = 96;

fn forms_proptest_cases() -> u32 {
    std::env::var("TW_FORMS_PROPTEST_CASES")
        .ok()
        .and_then(|raw| raw.parse::<u32>().ok())
        .filter(|value| *value > 0)
        .unwrap_or(DEFAULT_FORMS_PROPTEST_CASES)
}

fn fail(err: tw_forms::Error) -> TestCaseError {
    TestCaseError::fail(format!("{err:?}"))
}

fn validity_strategy() -> BoxedStrategy<ValidityState> {
    vec(any::<bool>(), Constraint::ALL.len())
        .prop_map(|flags| {
            let mut validity = ValidityState::default();
            for (constraint, on) in Constraint::ALL.into_iter().zip(flags) {
                validity.set(constraint, on);
            }
            validity
        })
        .boxed()
}

fn field_value_strategy() -> BoxedStrategy<String> {
    vec(
        prop_oneof![
            Just('a'),
            Just('z'),
            Just('0'),
            Just('7'),
            Just('@'),
            Just('.'),
            Just(' '),
        ],
        0..=8,
    )
    .prop_map(|chars| chars.into_iter().collect())
    .boxed()
}

fn checkbox_group_html(size: usize, checked: &[bool]) -> String {
    let mut boxes = String::new();
    for index in 0..size {
        let checked_attr = if checked.get(index).copied().unwrap_or(false) {
            " checked"
        } else {
            ""
        };
        boxes.push_str(&format!(
            "<input type='checkbox' id='m{index}' name='choice[]' class='FormField__input FormField__group-element' aria-errormessage='choice-error'{checked_attr}>"
        ));
    }
    format!(
        "<form id='f'><div class='FormField'>{boxes}<div id='choice-error' hidden></div></div></form>"
    )
}

const CONSTRAINED_FIELD: &str = r#"
    <form id='f'>
      <div class='FormField'>
        <input id='field' class='FormField__input' required pattern='[a-z0-9]+' minlength='2' maxlength='6' data-powermail-length='[2,6]' aria-errormessage='field-error'>
        <div id='field-error' hidden></div>
      </div>
    </form>
    "#;

fn assert_revalidation_is_idempotent(value: &str) -> TestCaseResult {
    let mut runtime = FormsRuntime::from_html(CONSTRAINED_FIELD).map_err(fail)?;
    runtime.set_pristine("#field", false).map_err(fail)?;
    runtime.type_text("#field", value).map_err(fail)?;

    let first = runtime.validate_field("#field", true, false).map_err(fail)?;
    let writes = runtime.dom_write_count();
    let second = runtime.validate_field("#field", true, false).map_err(fail)?;
    prop_assert_eq!(&first, &second);
    prop_assert_eq!(runtime.dom_write_count(), writes);

    if value.is_empty() {
        prop_assert_eq!(first.keys().copied().collect::<Vec<_>>(), vec![Constraint::ValueMissing]);
    }
    prop_assert!(first.len() <= 1 || !first.contains_key(&Constraint::ValueMissing));
    Ok(())
}

fn assert_pristine_suppresses_errors(value: &str) -> TestCaseResult {
    let mut runtime = FormsRuntime::from_html(CONSTRAINED_FIELD).map_err(fail)?;
    runtime.type_text("#field", value).map_err(fail)?;
    runtime.validate_field("#field", true, true).map_err(fail)?;

    runtime.set_pristine("#field", true).map_err(fail)?;
    let errors = runtime.validate_field("#field", true, false).map_err(fail)?;
    prop_assert!(errors.is_empty());
    prop_assert!(runtime.assert_count("#field-error [data-constraint]", 0).is_ok());
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: forms_proptest_cases(),
        failure_persistence: Some(Box::new(
            FileFailurePersistence::Direct(FORMS_PROPTEST_REGRESSION_FILE),
        )),
        .. ProptestConfig::default()
    })]

    #[test]
    fn bitmask_sums_the_active_constraint_bits(validity in validity_strategy()) {
        let expected: u32 = Constraint::ALL
            .into_iter()
            .filter(|constraint| validity.get(*constraint))
            .map(|constraint| 1u32 << constraint.index())
            .sum();
        prop_assert_eq!(validity.bitmask(), expected);
        prop_assert_eq!(validity.bitmask(), bitmask_of(validity.active()));
        prop_assert_eq!(validity.valid(), expected == 0);
    }

    #[test]
    fn group_is_missing_exactly_when_nothing_is_checked(
        checked in vec(any::<bool>(), 1..=6),
    ) {
        let html = checkbox_group_html(checked.len(), &checked);
        let runtime = FormsRuntime::from_html(&html).map_err(fail)?;
        let any_checked = checked.iter().any(|on| *on);
        for index in 0..checked.len() {
            let validity = runtime.validate_group(&format!("#m{index}")).map_err(fail)?;
            prop_assert_eq!(validity.value_missing, !any_checked);
        }
    }

    #[test]
    fn revalidating_unchanged_input_is_a_no_op(value in field_value_strategy()) {
        assert_revalidation_is_idempotent(&value)?;
    }

    #[test]
    fn pristine_fields_report_nothing(value in field_value_strategy()) {
        assert_pristine_suppresses_errors(&value)?;
    }
}
