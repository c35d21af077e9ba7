use std::cell::Cell;
use std::rc::Rc;

use super::*;
use crate::error::EnrichmentError;

/// Answers every request with the same canned content, or fails when none
/// is configured.
struct ScriptedClient {
    calls: Rc<Cell<usize>>,
    reply: Option<&'static str>,
}

impl ScriptedClient {
    fn boxed(reply: Option<&'static str>) -> (Box<dyn ModelClient>, Rc<Cell<usize>>) {
        let calls = Rc::new(Cell::new(0));
        let client = Self {
            calls: Rc::clone(&calls),
            reply,
        };
        (Box::new(client), calls)
    }
}

impl ModelClient for ScriptedClient {
    fn complete(&self, _request: &ModelRequest) -> Result<ModelInsights, EnrichmentError> {
        self.calls.set(self.calls.get() + 1);
        match self.reply {
            Some(content) => parse_insights(content),
            None => Err(EnrichmentError::EmptyResponse),
        }
    }
}

struct PanickingClient;

impl ModelClient for PanickingClient {
    fn complete(&self, _request: &ModelRequest) -> Result<ModelInsights, EnrichmentError> {
        panic!("invoices must not reach the model");
    }
}

const MODEL_REPLY: &str = r#"{
    "service_interest": "CRM System",
    "priority": "Υψηλή",
    "message_summary": "Χρειαζόμαστε CRM για 50 χρήστες.",
    "missing_fields": {"company": "TechCorp AE"}
}"#;

fn record(source: Source, name: &str) -> UnifiedRecord {
    UnifiedRecord::new(source, name)
}

fn local() -> Enricher {
    Enricher::local().expect("enricher builds")
}

fn remote(client: Box<dyn ModelClient>) -> Enricher {
    Enricher::new(EnrichmentMode::RemoteModel(client)).expect("enricher builds")
}

#[test]
fn heuristics_do_not_guess_service_or_priority() {
    let mut input = record(Source::Email, "email_urgent.eml");
    input.message =
        Some("Είναι επείγον να στηθεί CRM system και email marketing flow άμεσα.".to_string());

    let enriched = local().enrich(&input);

    assert_eq!(enriched.priority, None);
    assert_eq!(enriched.service, None);
    assert_eq!(
        enriched.message.as_deref(),
        Some("Είναι επείγον να στηθεί CRM system και email marketing flow άμεσα")
    );
    assert!(enriched.message.unwrap_or_default().chars().count() <= DEFAULT_SUMMARY_CHARS);
}

#[test]
fn heuristics_preserve_existing_fields() {
    let mut input = record(Source::Form, "contact_form_1.html");
    input.service = Some("Ανάπτυξη Website".to_string());
    input.priority = Some("Υψηλή".to_string());
    input.message = Some("Σύντομο μήνυμα".to_string());

    let enriched = local().enrich(&input);

    assert_eq!(enriched.service.as_deref(), Some("Ανάπτυξη Website"));
    assert_eq!(enriched.priority.as_deref(), Some("high"));
    assert_eq!(enriched.message.as_deref(), Some("Σύντομο μήνυμα"));
    assert_eq!(input.priority.as_deref(), Some("Υψηλή"));
}

#[test]
fn heuristics_prefer_need_statement() {
    let mut input = record(Source::Email, "email_need.eml");
    input.service = Some("CRM System".to_string());
    input.message = Some(
        "Χρειαζόμαστε:\n- Διαχείριση πελατών (300+)\n- Παρακολούθηση πωλήσεων".to_string(),
    );

    let message = local().enrich(&input).message.unwrap_or_default();

    assert!(message.starts_with("Χρειαζόμαστε"));
    assert!(message.contains("Διαχείριση πελατών"));
}

#[test]
fn heuristics_limit_message_to_first_sentence() {
    let mut input = record(Source::Form, "contact_form_1.html");
    input.service = Some("E-commerce Platform".to_string());
    input.priority = Some("high".to_string());
    input.message = Some(
        "Χρειαζόμαστε ένα νέο e-commerce website για την εταιρεία μας. \
         Έχουμε περίπου 200 προϊόντα και θέλουμε integration με το ERP μας."
            .to_string(),
    );

    let enriched = local().enrich(&input);

    assert_eq!(
        enriched.message.as_deref(),
        Some("Χρειαζόμαστε ένα νέο e-commerce website")
    );
}

#[test]
fn empty_message_is_synthesized_from_known_service() {
    let mut input = record(Source::Form, "form.html");
    input.service = Some("  CRM   System ".to_string());

    let enriched = local().enrich(&input);

    assert_eq!(enriched.service.as_deref(), Some("CRM System"));
    assert_eq!(
        enriched.message.as_deref(),
        Some("Χρειαζόμαστε λύση για CRM System")
    );
}

#[test]
fn placeholder_service_is_cleared_and_message_stays_empty() {
    let mut input = record(Source::Email, "mail.eml");
    input.service = Some("N/A".to_string());

    let enriched = local().enrich(&input);

    assert_eq!(enriched.service, None);
    assert_eq!(enriched.message, None);
}

#[test]
fn invoices_never_call_the_model_or_gain_fields() {
    let mut enricher = remote(Box::new(PanickingClient));
    let input = record(Source::Invoice, "invoice.html");

    let enriched = enricher.enrich(&input);

    assert_eq!(enriched.priority, None);
    assert_eq!(enriched.service, None);
    assert_eq!(enriched.message, None);
    assert_eq!(enricher.cached_responses(), 0);
}

#[test]
fn model_response_fills_missing_fields() {
    let (client, calls) = ScriptedClient::boxed(Some(MODEL_REPLY));
    let mut enricher = remote(client);
    let mut input = record(Source::Email, "email.eml");
    input.message = Some("Καλησπέρα σας".to_string());

    let enriched = enricher.enrich(&input);

    assert_eq!(calls.get(), 1);
    assert_eq!(enriched.priority.as_deref(), Some("high"));
    assert_eq!(enriched.service.as_deref(), Some("CRM System"));
    assert_eq!(
        enriched.message.as_deref(),
        Some("Χρειαζόμαστε CRM για 50 χρήστες.")
    );
    assert_eq!(enriched.company.as_deref(), Some("TechCorp AE"));
}

#[test]
fn existing_values_win_over_model_suggestions() {
    let (client, calls) = ScriptedClient::boxed(Some(MODEL_REPLY));
    let mut enricher = remote(client);
    let mut input = record(Source::Form, "form.html");
    input.service = Some("Ανάπτυξη Website".to_string());
    input.priority = Some("low".to_string());
    input.company = Some("Acme".to_string());

    let enriched = enricher.enrich(&input);

    assert_eq!(calls.get(), 1);
    assert_eq!(enriched.service.as_deref(), Some("Ανάπτυξη Website"));
    assert_eq!(enriched.priority.as_deref(), Some("low"));
    assert_eq!(enriched.company.as_deref(), Some("Acme"));
}

#[test]
fn identical_records_reuse_the_cached_response() {
    let (client, calls) = ScriptedClient::boxed(Some(MODEL_REPLY));
    let mut enricher = remote(client);
    let mut first = record(Source::Email, "a.eml");
    first.message = Some("Καλησπέρα σας".to_string());
    let mut second = record(Source::Email, "b.eml");
    second.message = Some("Καλησπέρα σας".to_string());

    let enriched = enricher.enrich_records(&[first, second]);

    assert_eq!(calls.get(), 1);
    assert_eq!(enricher.cached_responses(), 1);
    assert_eq!(enriched[0].service, enriched[1].service);
    assert_eq!(enriched[1].source_name(), "b.eml");
}

#[test]
fn model_failures_fall_back_to_heuristics_and_are_not_cached() {
    let (client, calls) = ScriptedClient::boxed(None);
    let mut enricher = remote(client);
    let mut input = record(Source::Form, "form.html");
    input.priority = Some("Μεσαία".to_string());
    input.message = Some("Θέλουμε νέο eshop. Ευχαριστώ.".to_string());

    let first = enricher.enrich(&input);
    let second = enricher.enrich(&input);

    assert_eq!(calls.get(), 2);
    assert_eq!(enricher.cached_responses(), 0);
    assert_eq!(first, local().enrich(&input));
    assert_eq!(first, second);
    assert_eq!(first.priority.as_deref(), Some("medium"));
    assert_eq!(first.message.as_deref(), Some("Θέλουμε νέο eshop"));
}

#[test]
fn malformed_model_content_is_rejected() {
    assert!(matches!(
        parse_insights("not json"),
        Err(EnrichmentError::MalformedResponse(_))
    ));

    let fenced = parse_insights("```json\n{\"priority\": \"low\"}\n```").expect("fenced json");
    assert_eq!(fenced.priority.as_deref(), Some("low"));
    assert_eq!(fenced.missing_company(), None);
}

#[test]
fn model_call_needed_only_when_local_signal_is_weak() {
    let mut complete = record(Source::Form, "form.html");
    complete.service = Some("CRM".to_string());
    complete.priority = Some("Υψηλή".to_string());
    complete.message = Some("Θέλουμε CRM.".to_string());
    assert!(!needs_model_call(&complete));

    let mut long = complete.clone();
    long.message = Some("α".repeat(361));
    assert!(needs_model_call(&long));

    let mut placeholder = complete.clone();
    placeholder.message = Some("Not provided".to_string());
    assert!(needs_model_call(&placeholder));

    let mut unknown_priority = complete.clone();
    unknown_priority.priority = Some("urgent".to_string());
    assert!(needs_model_call(&unknown_priority));

    assert!(!needs_model_call(&record(Source::Invoice, "invoice.html")));
}

#[test]
fn fingerprint_ignores_text_beyond_the_prefix() {
    let mut first = record(Source::Email, "a.eml");
    first.message = Some(format!("{}tail one", "x".repeat(500)));
    let mut second = record(Source::Email, "b.eml");
    second.message = Some(format!("{}tail two", "x".repeat(500)));
    let mut third = second.clone();
    third.company = Some("Other".to_string());

    assert_eq!(fingerprint(&first), fingerprint(&second));
    assert_ne!(fingerprint(&second), fingerprint(&third));
}

#[test]
fn prompt_truncates_long_messages() {
    let mut input = record(Source::Email, "a.eml");
    input.customer_name = Some("Μαρία".to_string());
    input.message = Some("λ".repeat(1500));

    let request = ModelRequest::from_record(&input);

    assert_eq!(request.message.chars().count(), 1200);
    assert_eq!(request.customer, "Μαρία");
    assert!(request.to_prompt().contains("\"customer\":\"Μαρία\""));
}

#[test]
fn config_selects_the_enrichment_mode() {
    let mut config = EnrichmentConfig {
        disabled: false,
        api_key: None,
        model: "gpt-5-nano".to_string(),
        base_url: "https://api.openai.com/v1".to_string(),
        timeout_secs: 30,
    };
    assert_eq!(
        Enricher::from_config(&config).expect("local").mode_label(),
        "local_heuristic"
    );

    config.api_key = Some("test-key".to_string());
    assert_eq!(
        Enricher::from_config(&config).expect("remote").mode_label(),
        "remote_model"
    );

    config.disabled = true;
    assert_eq!(
        Enricher::from_config(&config).expect("disabled").mode_label(),
        "local_heuristic"
    );
}
