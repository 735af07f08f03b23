use std::path::PathBuf;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand, ValueEnum};
use gestor::config::{BASE_URL_VAR, SESSION_FILE_VAR};
use gestor::dashboard::{BillingRow, RangePreset, RevenueSummary, TenantStats, billing_rows};
use gestor::net::types::{
    DEFAULT_CARGO, FaturamentoUpdate, NewTenant, NewUser, Tenant, TenantImage, TenantInfoForm, WorkingHoursForm,
    local_now,
};
use gestor::routes::{self, Navigation, Route};
use gestor::{ApiClient, ApiConfig, ApiError, AuthContext, AuthError, ConfigError, Envelope, SessionError, SessionStore};
use serde_json::{Value, json};
use time::macros::format_description;
use time::{Date, Weekday};

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("session store failed: {0}")]
    Session(#[from] SessionError),
    #[error("backend client failed: {0}")]
    Client(#[from] ApiError),
    #[error("auth failed: {}", .0.user_message())]
    Auth(#[from] AuthError),
    #[error("not signed in; run `gestor login`")]
    NotSignedIn,
    #[error("signed-in profile has no numeric id")]
    MissingOperatorId,
    #[error("session is still being restored")]
    SessionPending,
    #[error("{0}")]
    Rejected(String),
    #[error("{0} not found")]
    NotFound(String),
    #[error("--from and --to are required for a custom range")]
    MissingCustomRange,
    #[error("nothing to update")]
    NothingToUpdate,
    #[error("cannot read password: {0}")]
    Prompt(#[source] std::io::Error),
    #[error("cannot read image {}: {source}", path.display())]
    Image {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot format date range: {0}")]
    DateFormat(#[from] time::error::Format),
    #[error("invalid JSON payload: {0}")]
    InvalidJson(#[from] serde_json::Error),
}

#[derive(Parser, Debug)]
#[command(name = "gestor", about = "Delivery-platform operator console")]
struct Cli {
    /// Backend root URL. Falls back to GESTOR_API_BASE_URL.
    #[arg(long)]
    base_url: Option<String>,

    /// Cookie file holding the session. Falls back to GESTOR_SESSION_FILE,
    /// then to the user config directory.
    #[arg(long)]
    session_file: Option<String>,

    /// Keep the session in memory for this command only.
    #[arg(long, default_value_t = false, conflicts_with = "session_file")]
    ephemeral: bool,

    /// Log debug output to stderr.
    #[arg(short, long, default_value_t = false)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Sign in and store the session.
    Login {
        email: String,
        #[arg(long, env = "GESTOR_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },
    /// Forget the stored session.
    Logout,
    /// Show the signed-in operator.
    Whoami {
        /// Ask the backend to confirm the stored token first.
        #[arg(long, default_value_t = false)]
        verify: bool,
    },
    /// Restaurant counters, growth and revenue.
    Dashboard(RangeArgs),
    Tenants(TenantsCommand),
    Users(UsersCommand),
    Billing(BillingCommand),
}

#[derive(Args, Debug)]
struct RangeArgs {
    #[arg(long, value_enum, default_value_t = RangeKind::Last30)]
    range: RangeKind,

    #[arg(long, value_parser = parse_date)]
    from: Option<Date>,

    #[arg(long, value_parser = parse_date)]
    to: Option<Date>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum RangeKind {
    Today,
    Last30,
    Custom,
}

impl RangeArgs {
    fn preset(&self) -> Result<RangePreset, CliError> {
        match (self.range, self.from, self.to) {
            (RangeKind::Today, _, _) => Ok(RangePreset::Today),
            (RangeKind::Last30, _, _) => Ok(RangePreset::Last30Days),
            (RangeKind::Custom, Some(from), Some(to)) => Ok(RangePreset::Custom { from, to }),
            (RangeKind::Custom, _, _) => Err(CliError::MissingCustomRange),
        }
    }
}

#[derive(Args, Debug)]
struct TenantsCommand {
    #[command(subcommand)]
    command: TenantsSubcommand,
}

#[derive(Subcommand, Debug)]
enum TenantsSubcommand {
    List,
    Show {
        id: i64,
    },
    Create {
        #[arg(long)]
        nome: String,
        #[arg(long)]
        slug: String,
        #[arg(long, default_value = "#000000")]
        main_color: String,
        #[arg(long, default_value = "#ffffff")]
        second_color: String,
        #[arg(long)]
        img: Option<PathBuf>,
    },
    /// Flip a restaurant between active and inactive.
    Toggle {
        id: i64,
    },
    /// Set contact and address details.
    Contact(ContactArgs),
    /// Set opening hours, one `HH:MM-HH:MM` range per day.
    Hours(HoursArgs),
}

#[derive(Args, Debug)]
struct ContactArgs {
    id: i64,
    #[arg(long)]
    cnpj: Option<String>,
    #[arg(long)]
    telefone: Option<String>,
    #[arg(long)]
    whatsapp: Option<String>,
    #[arg(long)]
    cep: Option<String>,
    #[arg(long)]
    rua: Option<String>,
    #[arg(long)]
    numero: Option<String>,
    #[arg(long)]
    cidade: Option<String>,
    #[arg(long)]
    estado: Option<String>,
    #[arg(long)]
    bairro: Option<String>,
    #[arg(long)]
    instagram: Option<String>,
    #[arg(long)]
    complemento: Option<String>,
    #[arg(long)]
    latitude: Option<f64>,
    #[arg(long)]
    longitude: Option<f64>,
}

impl ContactArgs {
    fn form(self) -> TenantInfoForm {
        TenantInfoForm {
            cnpj: self.cnpj,
            telefone: self.telefone,
            whatsapp: self.whatsapp,
            cep: self.cep,
            rua: self.rua,
            numero: self.numero,
            cidade: self.cidade,
            estado: self.estado,
            bairro: self.bairro,
            instagram: self.instagram,
            complemento: self.complemento,
            latitude: self.latitude,
            longitude: self.longitude,
        }
    }
}

#[derive(Args, Debug)]
struct HoursArgs {
    id: i64,
    #[arg(long, value_parser = parse_hours)]
    seg: Option<Hours>,
    #[arg(long, value_parser = parse_hours)]
    ter: Option<Hours>,
    #[arg(long, value_parser = parse_hours)]
    quar: Option<Hours>,
    #[arg(long, value_parser = parse_hours)]
    quin: Option<Hours>,
    #[arg(long, value_parser = parse_hours)]
    sex: Option<Hours>,
    #[arg(long, value_parser = parse_hours)]
    sab: Option<Hours>,
    #[arg(long, value_parser = parse_hours)]
    dom: Option<Hours>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
struct Hours {
    open: String,
    close: String,
}

impl HoursArgs {
    fn form(&self) -> WorkingHoursForm {
        let days = [
            (Weekday::Monday, &self.seg),
            (Weekday::Tuesday, &self.ter),
            (Weekday::Wednesday, &self.quar),
            (Weekday::Thursday, &self.quin),
            (Weekday::Friday, &self.sex),
            (Weekday::Saturday, &self.sab),
            (Weekday::Sunday, &self.dom),
        ];
        let mut form = WorkingHoursForm::default();
        for (day, hours) in days {
            if let Some(hours) = hours {
                form.set(day, hours.open.as_str(), hours.close.as_str());
            }
        }
        form
    }
}

#[derive(Args, Debug)]
struct UsersCommand {
    #[command(subcommand)]
    command: UsersSubcommand,
}

#[derive(Subcommand, Debug)]
enum UsersSubcommand {
    /// Admins of one restaurant.
    List {
        tenant_id: i64,
    },
    Create {
        tenant_id: i64,
        #[arg(long)]
        nome: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        telefone: String,
        #[arg(long, env = "GESTOR_NEW_USER_PASSWORD", hide_env_values = true)]
        senha: Option<String>,
        #[arg(long, default_value = DEFAULT_CARGO)]
        cargo: String,
    },
    /// Flip an admin between active and inactive on the given restaurants.
    Toggle {
        user_id: i64,
        #[arg(long = "tenant", required = true)]
        tenants: Vec<i64>,
    },
}

#[derive(Args, Debug)]
struct BillingCommand {
    #[command(subcommand)]
    command: BillingSubcommand,
}

#[derive(Subcommand, Debug)]
enum BillingSubcommand {
    Show,
    Update {
        #[arg(long)]
        mensalidade: Option<f64>,
        #[arg(long)]
        implantacao: Option<f64>,
    },
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    load_dotenv();
    let cli = Cli::parse();
    let level = if cli.verbose { tracing::Level::DEBUG } else { tracing::Level::WARN };
    tracing_subscriber::fmt().with_writer(std::io::stderr).with_max_level(level).init();

    let config = resolve_config(&cli)?;
    let store = open_store(&config, cli.ephemeral)?;
    let api = ApiClient::new(&config.base_url, Arc::new(store))?;
    let mut auth = AuthContext::mount(api);

    run(&mut auth, cli.command).await
}

fn load_dotenv() {
    if let Err(error) = dotenvy::dotenv() {
        if !error.not_found() {
            eprintln!("ignoring unreadable .env: {error}");
        }
    }
}

/// Flags win over environment variables.
fn resolve_config(cli: &Cli) -> Result<ApiConfig, CliError> {
    let config = ApiConfig::from_lookup(|key| {
        let flag = match key {
            BASE_URL_VAR => cli.base_url.clone(),
            SESSION_FILE_VAR => cli.session_file.clone(),
            _ => None,
        };
        flag.or_else(|| std::env::var(key).ok())
    })?;
    Ok(config)
}

fn open_store(config: &ApiConfig, ephemeral: bool) -> Result<SessionStore, CliError> {
    if ephemeral {
        return Ok(SessionStore::in_memory());
    }
    match config.session_file.clone().or_else(default_session_path) {
        Some(path) => Ok(SessionStore::open(path)?),
        None => {
            tracing::warn!("no config directory; the session will not outlive this command");
            Ok(SessionStore::in_memory())
        }
    }
}

fn default_session_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("gestor").join("session.cookies"))
}

async fn run(auth: &mut AuthContext, command: Command) -> Result<(), CliError> {
    match command {
        Command::Login { email, password } => run_login(auth, &email, password).await,
        Command::Logout => {
            auth.sign_out()?;
            println!("signed out");
            Ok(())
        }
        Command::Whoami { verify } => run_whoami(auth, verify).await,
        Command::Dashboard(range) => run_dashboard(auth, &range).await,
        Command::Tenants(tenants) => run_tenants(auth, tenants).await,
        Command::Users(users) => run_users(auth, users).await,
        Command::Billing(billing) => run_billing(auth, billing).await,
    }
}

/// Pass `route` through the guard and return the signed-in operator's id.
fn require(auth: &AuthContext, route: &Route) -> Result<i64, CliError> {
    match routes::resolve(&route.path(), &auth.state()) {
        Navigation::Render(_) => {
            let user = auth.user().ok_or(CliError::NotSignedIn)?;
            user.id().ok_or(CliError::MissingOperatorId)
        }
        Navigation::Redirect(_) => Err(CliError::NotSignedIn),
        Navigation::Wait => Err(CliError::SessionPending),
    }
}

fn details(tenant_id: i64) -> Route {
    Route::RestaurantDetails(tenant_id.to_string())
}

async fn run_login(auth: &mut AuthContext, email: &str, password: Option<String>) -> Result<(), CliError> {
    let password = match password {
        Some(password) => password,
        None => rpassword::prompt_password("Senha: ").map_err(CliError::Prompt)?,
    };
    let user = auth.sign_in(email, &password).await?;
    println!("signed in as {} <{}>", user.nome(), user.email());
    Ok(())
}

async fn run_whoami(auth: &mut AuthContext, verify: bool) -> Result<(), CliError> {
    if verify && auth.is_authenticated() && !auth.verify_session().await? {
        println!("session rejected by the backend; signed out");
        return Ok(());
    }
    match auth.user() {
        Some(user) => print_json(&serde_json::to_value(user)?),
        None => {
            println!("not signed in");
            Ok(())
        }
    }
}

async fn run_dashboard(auth: &AuthContext, range: &RangeArgs) -> Result<(), CliError> {
    let operator = require(auth, &Route::Dashboard)?;
    let window = range.preset()?.range(local_now());
    let (start, end) = window.to_params()?;
    let api = auth.api();

    let (tenants, growth, total) = tokio::join!(
        api.get_tenants(),
        api.get_crescimento(operator),
        api.get_faturamento_total(operator, &start, &end),
    );
    let stats = TenantStats::from_tenants(&tenants, growth.as_ref());
    let revenue = RevenueSummary::from(total.as_ref());
    let rows = billing_rows(total.as_ref(), window.start.offset());

    println!("restaurants  {:>6}", stats.total);
    println!("  active     {:>6}", stats.active);
    println!("  inactive   {:>6}", stats.inactive);
    println!("growth       {:>+9.2}%", stats.growth);
    println!("revenue {start} .. {end}");
    println!("  total        {:>12.2}", revenue.total);
    println!("  mensalidades {:>12.2}", revenue.mensalidades);
    println!("  implantações {:>12.2}", revenue.implantacoes);
    println!("  records      {:>12}", revenue.records);
    if rows.is_empty() {
        println!("nenhum faturamento no período");
    }
    for row in &rows {
        println!("{}", billing_line(row));
    }
    Ok(())
}

fn billing_line(row: &BillingRow) -> String {
    format!(
        "  {:<28} {:>12.2} {:>12.2}  {}",
        row.restaurant, row.mensalidade, row.implantacao, row.date
    )
}

async fn run_tenants(auth: &AuthContext, tenants: TenantsCommand) -> Result<(), CliError> {
    let api = auth.api();
    match tenants.command {
        TenantsSubcommand::List => {
            require(auth, &Route::Restaurants)?;
            for tenant in api.get_tenants().await {
                println!("{:>6}  {:<28} {:<24} {}", tenant.id, tenant.nome, tenant.slug, status_label(tenant.status));
            }
            Ok(())
        }
        TenantsSubcommand::Show { id } => {
            require(auth, &details(id))?;
            let tenant = fetch_tenant(api, id).await?;
            print_json(&serde_json::to_value(&tenant)?)
        }
        TenantsSubcommand::Create { nome, slug, main_color, second_color, img } => {
            require(auth, &Route::NewRestaurant)?;
            let img = match img {
                Some(path) => match TenantImage::from_path(&path).await {
                    Ok(image) => Some(image),
                    Err(source) => return Err(CliError::Image { path, source }),
                },
                None => None,
            };
            let tenant = NewTenant { nome, slug, main_color, second_color, img };
            report(api.create_tenant(tenant).await)
        }
        TenantsSubcommand::Toggle { id } => {
            require(auth, &details(id))?;
            api.toggle_tenant_status(id, &json!({})).await.into_result().map_err(CliError::Rejected)?;
            // Show what the backend now holds rather than flipping locally.
            let tenant = fetch_tenant(api, id).await?;
            println!("{} is now {}", tenant.nome, status_label(tenant.status));
            Ok(())
        }
        TenantsSubcommand::Contact(args) => {
            let id = args.id;
            require(auth, &details(id))?;
            report(api.create_tenant_info_ender(id, &args.form()).await)
        }
        TenantsSubcommand::Hours(args) => {
            require(auth, &details(args.id))?;
            report(api.create_tenant_func(args.id, &args.form()).await)
        }
    }
}

async fn run_users(auth: &AuthContext, users: UsersCommand) -> Result<(), CliError> {
    let api = auth.api();
    match users.command {
        UsersSubcommand::List { tenant_id } => {
            require(auth, &details(tenant_id))?;
            for admin in api.get_users(tenant_id).await {
                println!("{:>6}  {:<28} {:<32} {:<14} {}", admin.id, admin.nome, admin.email, admin.cargo, status_label(admin.active));
            }
            Ok(())
        }
        UsersSubcommand::Create { tenant_id, nome, email, telefone, senha, cargo } => {
            require(auth, &details(tenant_id))?;
            let senha = match senha {
                Some(senha) => senha,
                None => rpassword::prompt_password("Senha do novo usuário: ").map_err(CliError::Prompt)?,
            };
            report(api.create_user(&NewUser::for_tenant(tenant_id, cargo, nome, email, telefone, senha)).await)
        }
        UsersSubcommand::Toggle { user_id, tenants } => {
            require(auth, &Route::Restaurants)?;
            api.toggle_user_status(user_id, &tenants).await.into_result().map_err(CliError::Rejected)?;
            let refreshed = match tenants.first() {
                Some(&tenant_id) => api.get_users(tenant_id).await.into_iter().find(|admin| admin.id == user_id),
                None => None,
            };
            match refreshed {
                Some(admin) => println!("{} is now {}", admin.nome, status_label(admin.active)),
                None => println!("status changed; user {user_id} could not be re-read"),
            }
            Ok(())
        }
    }
}

async fn run_billing(auth: &AuthContext, billing: BillingCommand) -> Result<(), CliError> {
    let operator = require(auth, &Route::Dashboard)?;
    let api = auth.api();
    match billing.command {
        BillingSubcommand::Show => {
            let values = api.get_valor_faturamento(operator).await.unwrap_or_default();
            println!("mensalidade  {}", money(values.valor_mensalidade));
            println!("implantação  {}", money(values.valor_implantacao));
            Ok(())
        }
        BillingSubcommand::Update { mensalidade, implantacao } => {
            let update = FaturamentoUpdate { valor_mensalidade: mensalidade, valor_implantacao: implantacao };
            if update.is_empty() {
                return Err(CliError::NothingToUpdate);
            }
            report(api.update_valor_faturamento(operator, &update).await)
        }
    }
}

async fn fetch_tenant(api: &ApiClient, id: i64) -> Result<Tenant, CliError> {
    api.get_tenant_by_id(id)
        .await
        .ok_or_else(|| CliError::NotFound(format!("restaurant {id}")))
}

fn report(envelope: Envelope<Value>) -> Result<(), CliError> {
    let data = envelope.into_result().map_err(CliError::Rejected)?;
    print_json(&data)
}

fn status_label(active: bool) -> &'static str {
    if active { "active" } else { "inactive" }
}

fn money(value: Option<f64>) -> String {
    value.map_or_else(|| "-".to_owned(), |value| format!("{value:.2}"))
}

fn print_json(value: &Value) -> Result<(), CliError> {
    let rendered = serde_json::to_string_pretty(value)?;
    println!("{rendered}");
    Ok(())
}

fn parse_date(raw: &str) -> Result<Date, String> {
    Date::parse(raw, format_description!("[year]-[month]-[day]"))
        .map_err(|error| format!("expected YYYY-MM-DD: {error}"))
}

fn parse_hours(raw: &str) -> Result<Hours, String> {
    let (open, close) = raw.split_once('-').ok_or_else(|| "expected HH:MM-HH:MM".to_owned())?;
    let valid = |value: &str| {
        let digits: String = value.chars().filter(|c| *c != ':').collect();
        value.len() == 5 && value.as_bytes()[2] == b':' && digits.len() == 4 && digits.chars().all(|c| c.is_ascii_digit())
    };
    if !valid(open.trim()) || !valid(close.trim()) {
        return Err(format!("expected HH:MM-HH:MM, got `{raw}`"));
    }
    Ok(Hours { open: open.trim().to_owned(), close: close.trim().to_owned() })
}

#[cfg(test)]
#[path = "main_test.rs"]
mod tests;
