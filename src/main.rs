use std::path::PathBuf;

use anyhow::Context;
use clap::{ArgGroup, Args, Parser, Subcommand};
use sqlx::postgres::PgPoolOptions;
use tracing::info;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

mod aggregate;
mod config;
mod db;
mod engine;
mod error;
mod grading;
mod models;
mod promotion;
mod ranking;
mod report;
mod store;
mod summary;
mod template;

use config::AppConfig;
use engine::{SchoolSettings, ScoringEngine};
use models::Term;
use ranking::RankingMetric;
use store::{MemoryStore, RecordStore};
use summary::DocumentKind;
use template::format_score;

#[derive(Parser)]
#[command(name = "school-scoring")]
#[command(about = "Grades, class rankings, promotion and report summaries for a school")]
#[command(long_about = None)]
struct Cli {
    /// TOML config file; defaults apply when it does not exist
    #[arg(long, global = true, default_value = config::DEFAULT_CONFIG_PATH)]
    config: PathBuf,
    /// Read scores from this CSV instead of Postgres
    #[arg(long, global = true)]
    from_csv: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Clone)]
struct Period {
    /// 1, 2 or 3; defaults to the configured current term
    #[arg(long)]
    term: Option<Term>,
    /// Academic year label; defaults to the configured current year
    #[arg(long)]
    year: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Load a demo class with first-term scores
    Seed,
    /// Import score entries from a CSV file
    Import {
        #[arg(long)]
        csv: PathBuf,
    },
    /// Show one student's subject totals, average and grade
    Aggregate {
        #[arg(long)]
        student: Uuid,
        #[command(flatten)]
        period: Period,
    },
    /// Rank a class for a term
    Rank {
        #[arg(long)]
        class: String,
        #[command(flatten)]
        period: Period,
        #[arg(long, value_enum, default_value_t = RankingMetric::Average)]
        metric: RankingMetric,
    },
    /// Classify end-of-year promotion for a class or one student
    #[command(group(
        ArgGroup::new("scope")
            .args(["class", "student"])
            .required(true)
            .multiple(false)
    ))]
    Promotion {
        #[arg(long)]
        class: Option<String>,
        #[arg(long)]
        student: Option<Uuid>,
        #[arg(long)]
        year: Option<String>,
    },
    /// Build the academic summary for one student
    Summary {
        #[arg(long)]
        student: Uuid,
        #[command(flatten)]
        period: Period,
        #[arg(long, value_enum, default_value_t = DocumentKind::ReportCard)]
        kind: DocumentKind,
        #[arg(long)]
        json: bool,
    },
    /// Render the guardian notification text for one student
    Notify {
        #[arg(long)]
        student: Uuid,
        #[command(flatten)]
        period: Period,
        /// Template file; the built-in notification is used otherwise
        #[arg(long)]
        template: Option<PathBuf>,
    },
    /// Build a year transcript for one student
    Transcript {
        #[arg(long)]
        student: Uuid,
        #[arg(long)]
        year: Option<String>,
        #[arg(long)]
        json: bool,
    },
    /// Write a markdown class report
    Report {
        #[arg(long)]
        class: String,
        #[command(flatten)]
        period: Period,
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let config = AppConfig::load_from(&cli.config)?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let settings = SchoolSettings {
        school_name: config.school.name.clone(),
        default_criteria: config.promotion.clone(),
    };

    if let Some(csv) = &cli.from_csv {
        if matches!(cli.command, Commands::InitDb | Commands::Seed | Commands::Import { .. }) {
            anyhow::bail!("init-db, seed and import need DATABASE_URL, not --from-csv");
        }
        let store = MemoryStore::from_csv(csv)?.with_criteria(config.promotion.clone());
        info!(path = %csv.display(), "using in-memory store");
        return run(ScoringEngine::new(store, settings), cli.command, &config).await;
    }

    let database_url = std::env::var("DATABASE_URL")
        .context("DATABASE_URL must be set, or pass --from-csv")?;

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .context("failed to connect to Postgres")?;

    match cli.command {
        Commands::InitDb => {
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            let written = db::seed(&pool).await?;
            println!("Seeded {written} score entries.");
        }
        Commands::Import { csv } => {
            let inserted = db::import_csv(&pool, &csv).await?;
            println!("Imported {inserted} score entries from {}.", csv.display());
        }
        command => {
            let engine = ScoringEngine::new(db::PgStore::new(pool), settings);
            run(engine, command, &config).await?;
        }
    }

    Ok(())
}

fn resolve(period: Period, config: &AppConfig) -> anyhow::Result<(Term, String)> {
    let term = match period.term {
        Some(term) => term,
        None => config.current_term()?,
    };
    let year = period
        .year
        .unwrap_or_else(|| config.school.current_year.clone());
    Ok((term, year))
}

async fn run<S: RecordStore>(
    engine: ScoringEngine<S>,
    command: Commands,
    config: &AppConfig,
) -> anyhow::Result<()> {
    let current_year = || config.school.current_year.clone();

    match command {
        Commands::InitDb | Commands::Seed | Commands::Import { .. } => {
            anyhow::bail!("database command reached the scoring engine")
        }
        Commands::Aggregate { student, period } => {
            let (term, year) = resolve(period, config)?;
            let aggregate = engine.compute_aggregate(student, term, &year).await?;

            if !aggregate.has_data() {
                println!("No scores recorded for {term} {year}.");
                return Ok(());
            }

            for subject in aggregate.subjects.iter() {
                println!(
                    "- {}: {} + {} = {} ({})",
                    subject.subject_name,
                    format_score(subject.class_score),
                    format_score(subject.exam_score),
                    format_score(subject.total_score),
                    subject.grade
                );
            }
            println!(
                "Average {}%, grade {}, exam total {} (doubled {})",
                aggregate.overall_average,
                aggregate
                    .overall_grade
                    .map(|grade| grade.to_string())
                    .unwrap_or_default(),
                format_score(aggregate.total_exam_score),
                format_score(aggregate.total_exam_score_doubled())
            );
        }
        Commands::Rank {
            class,
            period,
            metric,
        } => {
            let (term, year) = resolve(period, config)?;
            let ranking = engine.compute_ranking(&class, term, &year, metric).await?;
            let roster = engine.class_roster(&class).await?;

            if ranking.is_empty() {
                println!("No scores found for {class} in {term} {year}.");
                return Ok(());
            }

            let mut ranked: Vec<_> = roster
                .iter()
                .filter_map(|student| ranking.get(&student.id).map(|p| (p, student)))
                .collect();
            ranked.sort_by_key(|(position, _)| position.position);

            println!("{class} {term} {year}, ranked by {metric}:");
            for (position, student) in ranked {
                println!(
                    "{} of {} - {}",
                    position.position, position.class_size, student.full_name
                );
            }
            let unranked = roster.len().saturating_sub(ranking.len());
            if unranked > 0 {
                println!("{unranked} enrolled students have no scores and are not ranked.");
            }
        }
        Commands::Promotion {
            class,
            student,
            year,
        } => {
            let year = year.unwrap_or_else(current_year);
            if let Some(student_id) = student {
                let student = engine.student(student_id).await?;
                let criteria = engine.promotion_criteria().await?;
                let result = engine
                    .classify_promotion(student_id, Term::Third, &year, &criteria)
                    .await?;
                println!(
                    "{}: {} (average {}%, {} subjects passed)",
                    student.full_name,
                    result.status,
                    result.overall_average,
                    result.passed_subjects
                );
            } else if let Some(class) = class {
                let results = engine.class_promotions(&class, &year).await?;
                if results.is_empty() {
                    println!("No students enrolled in {class}.");
                    return Ok(());
                }
                println!("{class} promotion for {year}:");
                for (student, result) in results.iter() {
                    println!(
                        "- {}: {} (average {}%, {} subjects passed)",
                        student.full_name,
                        result.status,
                        result.overall_average,
                        result.passed_subjects
                    );
                }
            }
        }
        Commands::Summary {
            student,
            period,
            kind,
            json,
        } => {
            let (term, year) = resolve(period, config)?;
            let summary = engine.build_summary(student, term, &year, kind).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                let layout = "{STUDENT_NAME} ({CLASS}), {TERM} {YEAR}\n{SUBJECTS}\n\
                    Average {AVERAGE}% grade {OVERALL_GRADE}, position {POSITION} of {CLASS_SIZE}\n\
                    {PERFORMANCE}";
                println!("{}", engine.render_template(layout, &summary));
            }
        }
        Commands::Notify {
            student,
            period,
            template,
        } => {
            let (term, year) = resolve(period, config)?;
            let body = match template {
                Some(path) => std::fs::read_to_string(&path)
                    .with_context(|| format!("failed to read template {}", path.display()))?,
                None => template::DEFAULT_NOTIFICATION_TEMPLATE.to_string(),
            };
            let summary = engine
                .build_summary(student, term, &year, DocumentKind::Notification)
                .await?;
            println!("To: {} ({})", summary.guardian_name, summary.guardian_phone);
            println!();
            print!("{}", engine.render_template(&body, &summary));
        }
        Commands::Transcript {
            student,
            year,
            json,
        } => {
            let year = year.unwrap_or_else(current_year);
            let transcript = engine.build_transcript(student, &year).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&transcript)?);
                return Ok(());
            }

            println!(
                "Transcript for {} ({}), {}",
                transcript.student_name, transcript.class_name, transcript.year
            );
            if transcript.terms.is_empty() {
                println!("No scores recorded for this year.");
                return Ok(());
            }
            for summary in transcript.terms.iter() {
                println!();
                println!(
                    "{}",
                    engine.render_template(
                        "{TERM}: average {AVERAGE}% grade {OVERALL_GRADE}, position {POSITION} of {CLASS_SIZE}\n{SUBJECTS}",
                        summary
                    )
                );
            }
            if let (Some(average), Some(grade)) =
                (transcript.cumulative_average, transcript.cumulative_grade)
            {
                println!();
                println!("Cumulative average {average}%, grade {grade}");
            }
        }
        Commands::Report { class, period, out } => {
            let (term, year) = resolve(period, config)?;
            let report = engine.class_report(&class, term, &year).await?;
            std::fs::write(&out, report)?;
            println!("Report written to {}.", out.display());
        }
    }

    Ok(())
}
