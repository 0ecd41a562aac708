use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use hmc_client::{ApiClient, ClientConfig};
use hmc_core::query::{ListQuery, SortOrder};
use hmc_core::session::{Capability, FileStore, SessionContext};
use hmc_core::workflow::WorkflowError;
use hmc_export::{CellFormat, Column, CsvExporter, Exporter};

use hmc_client::consultation::{
    consultation_workflow, CLINICAL_NOTE, DIAGNOSIS, ENCOUNTER, VITALS,
};
use hmc_client::laboratory::LabResultEntry;
use hmc_client::patients::CreatePatient;

#[derive(Parser)]
#[command(name = "hmc")]
#[command(about = "Hospital management console")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Sign in with a backend token
    Login {
        /// Bearer token issued by the backend
        token: String,
        /// Role name, e.g. "doctor" or "Lab Technician"
        role: String,
    },
    /// Sign out and clear the stored session
    Logout,
    /// Show the current identity
    Whoami,
    /// List patients
    Patients {
        #[command(flatten)]
        paging: Paging,
        /// Write the page to a CSV file instead of printing
        #[arg(long)]
        export: Option<PathBuf>,
    },
    /// List appointments
    Appointments {
        #[command(flatten)]
        paging: Paging,
    },
    /// List ward beds
    Beds {
        #[command(flatten)]
        paging: Paging,
    },
    /// List pharmacy products
    Products {
        #[command(flatten)]
        paging: Paging,
        /// Write the page to a CSV file instead of printing
        #[arg(long)]
        export: Option<PathBuf>,
    },
    /// Register a patient
    CreatePatient {
        first_name: String,
        last_name: String,
        /// Contact email
        email: String,
        /// Date of birth (YYYY-MM-DD)
        date_of_birth: String,
        #[arg(long, default_value = "")]
        phone: String,
        #[arg(long, default_value = "")]
        national_id: String,
    },
    /// Record a consultation for a patient
    Consult {
        patient_id: String,
        /// Pulse reading for the vitals section
        #[arg(long)]
        pulse: Option<u32>,
        /// Diagnosis code, e.g. J10
        #[arg(long)]
        diagnosis: Option<String>,
        /// Free-text clinical note
        #[arg(long)]
        note: Option<String>,
    },
    /// Enter a lab result against an order
    AddLabResult {
        order_id: String,
        test_id: String,
        value: String,
        #[arg(long, default_value = "")]
        unit: String,
        #[arg(long, default_value = "")]
        flag: String,
    },
}

#[derive(clap::Args)]
struct Paging {
    #[arg(long, default_value_t = 1)]
    page: u32,
    #[arg(long, default_value_t = 10)]
    limit: u32,
    #[arg(long, default_value = "")]
    search: String,
    #[arg(long, default_value = "")]
    sort_by: String,
    /// Sort descending instead of ascending
    #[arg(long)]
    desc: bool,
}

impl Paging {
    fn to_query(&self) -> ListQuery {
        let mut query = ListQuery::new(self.sort_by.clone()).with_limit(self.limit);
        query.page = self.page;
        query.search = self.search.clone();
        if self.desc {
            query.sort_order = SortOrder::Descending;
        }
        query
    }
}

fn session_path() -> PathBuf {
    if let Ok(path) = std::env::var("HMC_SESSION_FILE") {
        return PathBuf::from(path);
    }
    match std::env::var("HOME") {
        Ok(home) => PathBuf::from(home).join(".hmc").join("session.json"),
        Err(_) => PathBuf::from(".hmc-session.json"),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env().add_directive("hmc=info".parse()?))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let session = SessionContext::new(Arc::new(FileStore::new(session_path())))?;

    let command = match cli.command {
        Some(command) => command,
        None => {
            println!("Use 'hmc --help' for commands");
            return Ok(());
        }
    };

    // Session commands work without a configured backend.
    match &command {
        Commands::Login { token, role } => {
            let identity = session.login(token.clone(), role)?;
            println!("Signed in as {}", identity.role);
            return Ok(());
        }
        Commands::Logout => {
            session.logout()?;
            println!("Signed out");
            return Ok(());
        }
        Commands::Whoami => {
            match session.identity() {
                Some(identity) => println!("Signed in as {}", identity.role),
                None => println!("Not signed in. Use 'hmc login <token> <role>'."),
            }
            return Ok(());
        }
        _ => {}
    }

    if session.identity().is_none() {
        println!("Not signed in. Use 'hmc login <token> <role>'.");
        return Ok(());
    }

    let config = ClientConfig::from_env()?;
    let client = ApiClient::new(config, session.clone())?;

    match command {
        Commands::Login { .. } | Commands::Logout | Commands::Whoami => {}

        Commands::Patients { paging, export } => {
            let query = paging.to_query();
            match export {
                Some(path) => {
                    let page = client.get_list("patients", &query).await?;
                    let columns = vec![
                        Column::new("first_name", "First name"),
                        Column::new("last_name", "Last name"),
                        Column::new("email", "Email"),
                        Column::new("date_of_birth", "Date of birth"),
                    ];
                    let bytes = CsvExporter.export(&page.rows, &columns)?;
                    std::fs::write(&path, bytes)?;
                    println!("Exported {} rows to {}", page.rows.len(), path.display());
                }
                None => {
                    let page = client.patients().list(&query).await?;
                    for patient in &page.rows {
                        println!("{}  {}  {}", patient.id, patient.full_name(), patient.email);
                    }
                    println!("{}", page.summary());
                }
            }
        }

        Commands::Appointments { paging } => {
            let page = client.appointments().list(&paging.to_query()).await?;
            for appointment in &page.rows {
                let when = appointment
                    .scheduled_at
                    .map(|t| t.to_rfc3339())
                    .unwrap_or_default();
                println!(
                    "{}  {}  {}  {}",
                    appointment.id, when, appointment.doctor_name, appointment.status
                );
            }
            println!("{}", page.summary());
        }

        Commands::Beds { paging } => {
            let page = client.beds().list(&paging.to_query()).await?;
            for bed in &page.rows {
                let state = if bed.occupied { "occupied" } else { "free" };
                println!("{}  {}  {}  {}", bed.id, bed.name, bed.ward, state);
            }
            println!("{}", page.summary());
        }

        Commands::Products { paging, export } => {
            let query = paging.to_query();
            match export {
                Some(path) => {
                    let page = client.get_list("products", &query).await?;
                    let columns = vec![
                        Column::new("name", "Product"),
                        Column::new("sku", "SKU"),
                        Column::new("unit_price", "Unit price").with_format(CellFormat::Currency),
                        Column::new("stock_qty", "In stock").with_format(CellFormat::Number),
                    ];
                    let bytes = CsvExporter.export(&page.rows, &columns)?;
                    std::fs::write(&path, bytes)?;
                    println!("Exported {} rows to {}", page.rows.len(), path.display());
                }
                None => {
                    let page = client.products().list(&query).await?;
                    for product in &page.rows {
                        println!(
                            "{}  {}  {:.2}  {}",
                            product.id, product.name, product.unit_price, product.stock_qty
                        );
                    }
                    println!("{}", page.summary());
                }
            }
        }

        Commands::CreatePatient {
            first_name,
            last_name,
            email,
            date_of_birth,
            phone,
            national_id,
        } => {
            if !session.allows(Capability::ManagePatients) {
                println!("Your role cannot register patients.");
                return Ok(());
            }
            let payload = CreatePatient {
                first_name,
                last_name,
                email,
                phone,
                gender: String::new(),
                date_of_birth,
                address: String::new(),
                national_id,
            };
            let id = client.patients().create(&payload).await?;
            println!("Created patient {}", id);
        }

        Commands::Consult {
            patient_id,
            pulse,
            diagnosis,
            note,
        } => {
            if !session.allows(Capability::RunConsultations) {
                println!("Your role cannot record consultations.");
                return Ok(());
            }
            let consultations = client.consultations();
            let mut workflow = consultation_workflow();

            let outcome = workflow
                .advance(
                    ENCOUNTER,
                    &serde_json::json!({"patient_id": patient_id}),
                    &consultations,
                )
                .await?;
            println!("Encounter {}", outcome.id());

            if let Some(pulse) = pulse {
                save_section(
                    &mut workflow,
                    VITALS,
                    serde_json::json!({"pulse": pulse}),
                    &consultations,
                )
                .await?;
            }
            if let Some(code) = diagnosis {
                save_section(
                    &mut workflow,
                    DIAGNOSIS,
                    serde_json::json!({"code": code}),
                    &consultations,
                )
                .await?;
            }
            if let Some(text) = note {
                save_section(
                    &mut workflow,
                    CLINICAL_NOTE,
                    serde_json::json!({"text": text}),
                    &consultations,
                )
                .await?;
            }

            let unsaved = workflow.unsaved_children();
            if !unsaved.is_empty() {
                println!("Sections not recorded: {}", unsaved.join(", "));
            }
        }

        Commands::AddLabResult {
            order_id,
            test_id,
            value,
            unit,
            flag,
        } => {
            if !session.allows(Capability::EnterLabResults) {
                println!("Your role cannot enter lab results.");
                return Ok(());
            }
            let entry = LabResultEntry {
                test_id,
                value,
                unit,
                flag,
            };
            client.lab_test_orders().add_result(&order_id, &entry).await?;
            println!("Result recorded on order {}", order_id);
        }
    }

    Ok(())
}

async fn save_section(
    workflow: &mut hmc_core::workflow::SequentialWorkflow,
    step: &str,
    payload: serde_json::Value,
    consultations: &hmc_client::consultation::Consultations,
) -> Result<(), WorkflowError> {
    let outcome = workflow.advance(step, &payload, consultations).await?;
    println!("Saved {} ({})", step, outcome.id());
    Ok(())
}
