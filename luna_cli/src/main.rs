use chrono::Utc;
use clap::{Parser, Subcommand};
use luna_core::history::recent_events;
use luna_core::*;
use serde_json::Value;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "luna")]
#[command(about = "Cycle-aware wellness reflection log", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Override data directory
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Mark onboarding as complete
    Onboard,

    /// Record a successful sign-in
    SignIn,

    /// Record a subscription purchase (none, monthly, yearly)
    Subscribe { tier: String },

    /// Sync the current cycle day and length
    Cycle {
        #[arg(long)]
        day: u32,

        #[arg(long)]
        length: Option<u32>,
    },

    /// Log a daily check-in
    Checkin {
        /// Energy, 1-5
        #[arg(long)]
        energy: Option<u8>,

        /// Mood, 1-5
        #[arg(long)]
        mood: Option<u8>,

        /// Hours slept
        #[arg(long)]
        sleep: Option<f32>,

        /// Reported symptom (repeatable)
        #[arg(long = "symptom")]
        symptoms: Vec<String>,

        #[arg(long)]
        notes: Option<String>,
    },

    /// Add or remove a medication
    Med {
        #[command(subcommand)]
        action: MedAction,
    },

    /// Record raw lab marker text
    Lab { text: String },

    /// Update profile fields
    Profile {
        #[arg(long)]
        name: Option<String>,

        /// Birth date as YYYY-MM-DD
        #[arg(long)]
        birth_date: Option<String>,

        #[arg(long)]
        email: Option<String>,
    },

    /// Save an audio reflection transcript
    Reflect {
        transcript: String,

        #[arg(long)]
        duration: Option<u32>,
    },

    /// Log a meal or snack
    Fuel {
        description: String,

        #[arg(long)]
        calories: Option<u32>,
    },

    /// Append a raw event, e.g. `append DAILY_CHECKIN '{"symptoms":["cramps"]}'`
    Append { event_type: String, payload: String },

    /// Print the projected state as JSON
    State,

    /// Run the rule engine on the current state (default)
    Insights {
        /// Age to evaluate with, overriding config and profile
        #[arg(long)]
        age: Option<u32>,

        /// Print the raw rule output as JSON
        #[arg(long)]
        json: bool,
    },

    /// List recent events, newest first
    History {
        /// Only events of this type
        #[arg(long = "type")]
        event_type: Option<String>,

        #[arg(long, default_value_t = 10)]
        limit: usize,
    },

    /// Export all data as JSON, optionally check-ins as CSV
    Export {
        #[arg(long)]
        out: PathBuf,

        #[arg(long)]
        csv: Option<PathBuf>,

        /// Narrative summary to include
        #[arg(long)]
        summary: Option<String>,
    },
}

#[derive(Subcommand)]
enum MedAction {
    /// Add a medication
    Add {
        #[arg(long)]
        name: String,

        #[arg(long)]
        dose: Option<String>,

        #[arg(long)]
        start_date: Option<String>,

        #[arg(long, default_value = "")]
        note: String,
    },

    /// Remove a medication by id
    Remove { id: String },
}

fn main() -> Result<()> {
    // Initialize logging
    luna_core::logging::init();

    let cli = Cli::parse();

    let config = Config::load()?;
    let data_dir = cli
        .data_dir
        .unwrap_or_else(|| config.data.data_dir.clone());
    let mut store = JsonFileStore::new(config.data.log_path_in(&data_dir));

    let command = cli.command.unwrap_or(Commands::Insights {
        age: None,
        json: false,
    });

    match command {
        Commands::Onboard => log_event(&mut store, EventKind::OnboardingComplete),
        Commands::SignIn => log_event(&mut store, EventKind::AuthSuccess),
        Commands::Subscribe { tier } => {
            let tier: SubscriptionTier =
                serde_json::from_value(Value::String(tier.to_lowercase())).map_err(|_| {
                    Error::Validation(format!(
                        "unknown tier '{}' (expected none, monthly or yearly)",
                        tier
                    ))
                })?;
            log_event(
                &mut store,
                EventKind::SubscriptionPurchase(SubscriptionPayload { tier: Some(tier) }),
            )
        }
        Commands::Cycle { day, length } => log_event(
            &mut store,
            EventKind::CycleSync(CycleSyncPayload {
                day: Some(day),
                length,
            }),
        ),
        Commands::Checkin {
            energy,
            mood,
            sleep,
            symptoms,
            notes,
        } => log_event(
            &mut store,
            EventKind::DailyCheckin(CheckinPayload {
                energy,
                mood,
                sleep_hours: sleep,
                symptoms,
                notes,
                ..Default::default()
            }),
        ),
        Commands::Med { action } => cmd_med(&mut store, action),
        Commands::Lab { text } => log_event(
            &mut store,
            EventKind::LabMarkerEntry(LabMarkerPayload {
                raw_text: Some(text),
            }),
        ),
        Commands::Profile {
            name,
            birth_date,
            email,
        } => log_event(
            &mut store,
            EventKind::ProfileUpdate(ProfilePatch {
                name,
                birth_date,
                email,
                ..Default::default()
            }),
        ),
        Commands::Reflect {
            transcript,
            duration,
        } => log_event(
            &mut store,
            EventKind::AudioReflection(AudioReflectionPayload {
                transcript,
                duration_seconds: duration,
            }),
        ),
        Commands::Fuel {
            description,
            calories,
        } => log_event(
            &mut store,
            EventKind::FuelLog(FuelLogPayload {
                description,
                calories,
            }),
        ),
        Commands::Append {
            event_type,
            payload,
        } => {
            let event_type: EventType = event_type.parse()?;
            let payload: Value = serde_json::from_str(&payload)?;
            let event = store.append(event_type, payload)?;
            print_logged(&event);
            Ok(())
        }
        Commands::State => cmd_state(&store),
        Commands::Insights { age, json } => cmd_insights(&store, &config, age, json),
        Commands::History { event_type, limit } => cmd_history(&store, event_type, limit),
        Commands::Export { out, csv, summary } => {
            cmd_export(&mut store, &out, csv.as_deref(), summary)
        }
    }
}

fn log_event(store: &mut JsonFileStore, kind: EventKind) -> Result<()> {
    let event = store.append_kind(&kind)?;
    print_logged(&event);
    Ok(())
}

fn print_logged(event: &HealthEvent) {
    println!("✓ Logged {} ({})", event.event_type, event.id);
}

fn cmd_med(store: &mut JsonFileStore, action: MedAction) -> Result<()> {
    let payload = match action {
        MedAction::Add {
            name,
            dose,
            start_date,
            note,
        } => MedicationLogPayload::Add(MedicationDraft {
            id: None,
            name,
            dose,
            start_date,
            observations: Vec::new(),
            notes: note,
        }),
        MedAction::Remove { id } => {
            // Advisory only: the log is re-read under lock by the append, and
            // removing an id that is already gone is a no-op in the fold.
            let state = project_state(&store.get_log()?);
            if state.medication(&id).is_none() {
                return Err(Error::Validation(format!("no medication with id '{}'", id)));
            }
            MedicationLogPayload::Remove { med_id: id }
        }
    };
    log_event(store, EventKind::MedicationLog(payload))
}

fn cmd_state(store: &JsonFileStore) -> Result<()> {
    let state = project_state(&load_log_or_empty(store));
    println!("{}", serde_json::to_string_pretty(&state)?);
    Ok(())
}

/// Explicit flag, then profile birth date if enabled, then configured default
fn resolve_age(state: &SystemState, config: &Config, age: Option<u32>) -> u32 {
    if let Some(age) = age {
        return age;
    }
    if config.physio.derive_age_from_profile {
        if let Some(age) = state.profile.age_on(Utc::now().date_naive()) {
            return age;
        }
        tracing::info!("Profile has no usable birth date, using configured default age");
    }
    config.physio.default_age
}

fn cmd_insights(store: &JsonFileStore, config: &Config, age: Option<u32>, json: bool) -> Result<()> {
    get_default_catalog().check()?;

    let state = project_state(&load_log_or_empty(store));
    let age = resolve_age(&state, config, age);
    let input = PhysioInput::from_state(&state, age, config.physio.symptom_scope);
    let output = run_rule_engine(&input);

    if json {
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    display_output(&state, &output);
    Ok(())
}

fn display_output(state: &SystemState, output: &RuleOutput) {
    println!("\n╭─────────────────────────────────────────╮");
    println!(
        "│  DAY {} OF {} · {}",
        state.current_day,
        state.cycle_length,
        state.cycle_phase().to_string().to_uppercase()
    );
    println!("╰─────────────────────────────────────────╯");
    println!();

    match &output.archetype {
        Some(archetype) => {
            println!("  {}", archetype.name);
            println!("  {}", archetype.description);
        }
        None => println!("  No dominant archetype today"),
    }
    println!();

    for (hormone, status) in &output.hormone_statuses {
        println!("  {:<14} {}", hormone.to_string(), status);
    }

    if !output.insights.is_empty() {
        println!();
        println!("  Insights:");
        for insight in &output.insights {
            println!("  → {}", insight.text);
        }
    }

    if !output.doctor_questions.is_empty() {
        println!();
        println!("  Questions for your doctor:");
        for question in &output.doctor_questions {
            println!("  ? {}", question.question);
        }
    }

    println!();
}

fn cmd_history(store: &JsonFileStore, event_type: Option<String>, limit: usize) -> Result<()> {
    let event_type = event_type
        .map(|t| t.parse::<EventType>())
        .transpose()?;
    let log = load_log_or_empty(store);
    let events = recent_events(&log, event_type.as_ref(), limit);

    if events.is_empty() {
        println!("No events found.");
        return Ok(());
    }

    for event in events {
        println!(
            "{}  {:<22} {}  {}",
            event.timestamp.format("%Y-%m-%d %H:%M"),
            event.event_type.to_string(),
            event.id,
            event.payload
        );
    }
    Ok(())
}

fn cmd_export(
    store: &mut JsonFileStore,
    out: &Path,
    csv: Option<&Path>,
    summary: Option<String>,
) -> Result<()> {
    let state = project_state(&store.get_log()?);
    let snapshot = ExportSnapshot::from_state(&state, summary, Utc::now());
    snapshot.write_json(out)?;
    println!(
        "✓ Exported {} events to {}",
        snapshot.metadata.event_count,
        out.display()
    );

    if let Some(csv_path) = csv {
        let rows = luna_core::export::write_checkins_csv(&state.events, csv_path)?;
        println!("✓ Exported {} check-ins to {}", rows, csv_path.display());
    }

    store.append_kind(&EventKind::DataExported(DataExportedPayload {
        format: Some(if csv.is_some() { "json+csv" } else { "json" }.to_string()),
        destination: Some(out.display().to_string()),
    }))?;
    Ok(())
}
