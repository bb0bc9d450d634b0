use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use lookout_core::{Config, FaceDetector, FaceRecognizer, PersonRecord};
use lookout_hw::Camera;
use lookout_store::EnrollmentStore;
use std::path::PathBuf;

mod draw;
mod pool;
mod watch;

#[derive(Parser)]
#[command(name = "lookout", about = "Lookout face recognition demo")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the live webcam recognition loop ('q' quits)
    Watch,
    /// List enrolled people
    List,
    /// Enroll a person from image files on disk
    Enroll {
        /// Person's name (also determines the storage identifier)
        name: String,
        #[arg(long)]
        age: String,
        #[arg(long)]
        nationality: String,
        /// One or more photos of the person
        #[arg(required = true)]
        images: Vec<PathBuf>,
    },
    /// List available camera devices
    Devices,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config = Config::from_env();

    match cli.command {
        Commands::Watch => watch::run(&config),
        Commands::List => list(&config),
        Commands::Enroll { name, age, nationality, images } => {
            enroll(&config, &name, &age, &nationality, &images)
        }
        Commands::Devices => {
            let devices = Camera::list_devices();
            if devices.is_empty() {
                println!("no capture devices found");
            }
            for d in devices {
                println!("{}  {} ({})", d.path, d.name, d.driver);
            }
            Ok(())
        }
    }
}

fn list(config: &Config) -> Result<()> {
    let store = EnrollmentStore::open(&config.uploads_dir)?;
    let people = store.load_all()?;
    if people.is_empty() {
        println!("no one enrolled");
        return Ok(());
    }
    for (identifier, record) in people {
        println!(
            "{identifier}: {} (age {}, {}) — {} embedding(s), enrolled {}",
            record.name,
            record.age,
            record.nationality,
            record.embeddings.len(),
            record.created_at
        );
    }
    Ok(())
}

/// Offline enrollment: same pipeline as the HTTP upload, fed from files.
fn enroll(
    config: &Config,
    name: &str,
    age: &str,
    nationality: &str,
    images: &[PathBuf],
) -> Result<()> {
    let store = EnrollmentStore::open(&config.uploads_dir)?;
    let mut detector =
        FaceDetector::load(&config.detector_model_path()).context("loading detector model")?;
    let mut recognizer = FaceRecognizer::load(&config.recognizer_model_path())
        .context("loading recognizer model")?;

    let mut raw_images = Vec::new();
    let mut embeddings = Vec::new();

    for path in images {
        let bytes =
            std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;

        let decoded = match image::load_from_memory(&bytes) {
            Ok(img) => img.to_rgb8(),
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %err, "undecodable image, skipping");
                raw_images.push(bytes);
                continue;
            }
        };

        let faces = match detector.detect(&decoded) {
            Ok(faces) => faces,
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %err, "detection failed, skipping");
                raw_images.push(bytes);
                continue;
            }
        };

        match faces.first() {
            Some(face) => match recognizer.extract(&decoded, face) {
                Ok(embedding) => embeddings.push(embedding),
                Err(err) => {
                    tracing::warn!(path = %path.display(), error = %err, "embedding failed, skipping");
                }
            },
            None => {
                tracing::warn!(path = %path.display(), "no face detected, skipping");
            }
        }
        raw_images.push(bytes);
    }

    let identifier = EnrollmentStore::identifier_for(name);
    let record = PersonRecord {
        name: name.to_string(),
        age: age.to_string(),
        nationality: nationality.to_string(),
        embeddings,
        created_at: Utc::now().to_rfc3339(),
    };
    store.put(&identifier, &record, &raw_images)?;

    println!(
        "enrolled {identifier}: {} of {} image(s) embedded",
        record.embeddings.len(),
        images.len()
    );
    Ok(())
}
