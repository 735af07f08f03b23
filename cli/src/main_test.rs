use clap::CommandFactory;

use super::*;

fn parse(args: &[&str]) -> Cli {
    Cli::try_parse_from(std::iter::once("gestor").chain(args.iter().copied())).unwrap()
}

fn anonymous() -> AuthContext {
    let api = ApiClient::new("http://127.0.0.1:9", Arc::new(SessionStore::in_memory())).unwrap();
    AuthContext::mount(api)
}

#[test]
fn cli_definition_is_valid() {
    Cli::command().debug_assert();
}

#[test]
fn dashboard_defaults_to_last_30_days() {
    let Command::Dashboard(range) = parse(&["dashboard"]).command else {
        panic!("expected dashboard");
    };
    assert_eq!(range.preset().unwrap(), RangePreset::Last30Days);
}

#[test]
fn custom_range_needs_both_dates() {
    let Command::Dashboard(range) = parse(&["dashboard", "--range", "custom", "--from", "2025-01-01"]).command else {
        panic!("expected dashboard");
    };
    assert!(matches!(range.preset(), Err(CliError::MissingCustomRange)));
}

#[test]
fn custom_range_parses_dates() {
    let cli = parse(&["dashboard", "--range", "custom", "--from", "2025-01-01", "--to", "2025-01-31"]);
    let Command::Dashboard(range) = cli.command else {
        panic!("expected dashboard");
    };
    assert!(matches!(range.preset(), Ok(RangePreset::Custom { .. })));
}

#[test]
fn bad_date_is_rejected_by_parser() {
    assert!(Cli::try_parse_from(["gestor", "dashboard", "--from", "31/01/2025"]).is_err());
}

#[test]
fn hours_parse_into_form() {
    assert_eq!(parse_hours("08:00-18:30").unwrap(), Hours { open: "08:00".to_owned(), close: "18:30".to_owned() });
    assert!(parse_hours("8-18").is_err());
    assert!(parse_hours("08:00").is_err());

    let Command::Tenants(TenantsCommand { command: TenantsSubcommand::Hours(args) }) =
        parse(&["tenants", "hours", "4", "--seg", "08:00-18:00", "--dom", "10:00-14:00"]).command
    else {
        panic!("expected tenants hours");
    };
    let form = args.form();
    assert_eq!(form.seg_open.as_deref(), Some("08:00"));
    assert_eq!(form.dom_close.as_deref(), Some("14:00"));
    assert_eq!(form.ter_open, None);
}

#[test]
fn user_create_defaults_cargo() {
    let cli = parse(&["users", "create", "3", "--nome", "Bia", "--email", "b@x.test", "--telefone", "1", "--senha", "s"]);
    let Command::Users(UsersCommand { command: UsersSubcommand::Create { cargo, .. } }) = cli.command else {
        panic!("expected users create");
    };
    assert_eq!(cargo, DEFAULT_CARGO);
}

#[test]
fn user_toggle_requires_tenant() {
    assert!(Cli::try_parse_from(["gestor", "users", "toggle", "5"]).is_err());
}

#[test]
fn base_url_flag_overrides_environment() {
    let cli = parse(&["--base-url", "http://backend.test/", "--session-file", "/tmp/s.cookies", "logout"]);
    let config = resolve_config(&cli).unwrap();
    assert_eq!(config.base_url, "http://backend.test");
    assert_eq!(config.session_file, Some(PathBuf::from("/tmp/s.cookies")));
}

#[test]
fn protected_command_without_session_is_refused() {
    let auth = anonymous();
    assert!(matches!(require(&auth, &Route::Dashboard), Err(CliError::NotSignedIn)));
    assert!(matches!(require(&auth, &details(3)), Err(CliError::NotSignedIn)));
}

#[test]
fn profile_without_numeric_id_is_refused() {
    let store = SessionStore::in_memory();
    store.persist_session("tok", r#"{"email":"a@b.com"}"#).unwrap();
    let auth = AuthContext::mount(ApiClient::new("http://127.0.0.1:9", Arc::new(store)).unwrap());

    assert!(auth.is_authenticated());
    assert!(matches!(require(&auth, &Route::Dashboard), Err(CliError::MissingOperatorId)));
}

#[test]
fn signed_in_operator_id_is_returned() {
    let store = SessionStore::in_memory();
    store.persist_session("tok", r#"{"id":7,"email":"a@b.com"}"#).unwrap();
    let auth = AuthContext::mount(ApiClient::new("http://127.0.0.1:9", Arc::new(store)).unwrap());

    assert_eq!(require(&auth, &Route::Dashboard).unwrap(), 7);
}

#[test]
fn billing_line_shows_name_values_and_date() {
    let row = BillingRow {
        restaurant: "Cantina Roma".to_owned(),
        mensalidade: 199.9,
        implantacao: 500.0,
        date: "05/03/2025".to_owned(),
    };
    let line = billing_line(&row);
    assert!(line.contains("Cantina Roma"));
    assert!(line.contains("199.90"));
    assert!(line.contains("500.00"));
    assert!(line.ends_with("05/03/2025"));
}

#[test]
fn money_formats_two_places() {
    assert_eq!(money(Some(99.5)), "99.50");
    assert_eq!(money(None), "-");
}
