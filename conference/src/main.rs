//! Conference Enrollment Demo
//!
//! Walks through the enrollment rules on a seeded conference:
//! - Capacity-bounded sign-up and the VIP waitlist priority block
//! - Promotion on cancellation and on capacity increase
//! - VIP-only events, speaker eligibility and room limits
//! - Event cancellation fanning out to participants
//!
//! # Usage
//!
//! ```bash
//! # Built-in seed
//! cargo run --bin conference-demo
//!
//! # Custom seed, metrics scrape at the end
//! CONCLAVE_SEED_FILE=conference/seed/demo.json CONCLAVE_METRICS_ENABLED=true \
//!     cargo run --bin conference-demo
//! ```

use conclave_core::{Capacity, EventId, ParticipantId};
use conclave_runtime::EnrollmentService;
use conference::{Config, ConferenceApp, DEFAULT_LOG_FILTER, Seed};
use std::collections::HashMap;
use std::error::Error;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

const BUILTIN_SEED: &str = include_str!("../seed/demo.json");

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    dotenvy::dotenv().ok();
    let config = Config::from_env()?;

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_new(&config.log_filter)
                .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    println!("\n🎤 ============================================");
    println!("   Conference Enrollment - Live Demo");
    println!("============================================\n");

    let app = ConferenceApp::new(&config)?;
    let seed = match &config.seed_file {
        Some(path) => {
            println!("📂 Loading seed from {}", path.display());
            Seed::from_file(path).await?
        },
        None => Seed::from_json(BUILTIN_SEED)?,
    };
    let ids = app.seed(&seed).await?;
    println!(
        "✓ Seeded {} rooms, {} participants, {} events\n",
        ids.rooms.len(),
        ids.participants.len(),
        ids.events.len()
    );

    let service = &app.service;
    let workshop = key(&ids.events, "Abstraction Workshop")?;
    let dinner = key(&ids.events, "Speakers Dinner")?;
    let keynote = key(&ids.events, "Opening Keynote")?;
    let chen = key(&ids.participants, "Chen")?;
    let emeka = key(&ids.participants, "Emeka")?;
    let brian = key(&ids.participants, "Brian")?;
    let grace = key(&ids.participants, "Grace Hopper")?;

    // ========== Waitlist priority ==========

    println!("1️⃣  Workshop is full; a VIP arrives after Farah is already waiting");
    print_roster(service, workshop).await?;
    report("Emeka signs up", service.sign_up(workshop, emeka).await);
    report("Emeka joins waitlist", service.join_waitlist(workshop, emeka).await);
    report("Brian joins waitlist", service.join_waitlist(workshop, brian).await);
    print_roster(service, workshop).await?;

    // ========== Promotion ==========

    println!("\n2️⃣  Chen cancels; the head of the waitlist takes the seat");
    let promoted = service.cancel_enrollment(workshop, chen).await?;
    println!("   promoted: {}", names(service, &promoted).await?);
    print_roster(service, workshop).await?;

    println!("\n3️⃣  Room allows one more seat");
    let promoted = service.change_capacity(workshop, Capacity::new(3)).await?;
    println!("   promoted: {}", names(service, &promoted).await?);
    print_roster(service, workshop).await?;
    report(
        "Resize beyond the room",
        service.change_capacity(workshop, Capacity::new(4)).await.map(|_| ()),
    );

    // ========== Eligibility ==========

    println!("\n4️⃣  Eligibility rules");
    report("Brian signs up for the VIP dinner", service.sign_up(dinner, brian).await);
    report("Grace signs up for the keynote as a listener", service.sign_up(keynote, grace).await);
    let open = service.events_open_to(brian).await?;
    let titles: Vec<&str> = open.iter().map(|event| event.title.as_str()).collect();
    println!("   open to Brian: {}", titles.join(", "));

    // ========== Cancellation ==========

    println!("\n5️⃣  The dinner is cancelled");
    let affected = service.cancel_event(dinner).await?;
    println!("   notified: {}", names(service, &affected).await?);
    let ada = key(&ids.participants, "Ada")?;
    println!(
        "   Ada is now enrolled in {} events",
        service.enrolled_events(ada).await?.len()
    );

    if let Some(scrape) = app.metrics_scrape() {
        println!("\n📊 Metrics\n{scrape}");
    }

    println!("\n✓ Demo complete\n");
    Ok(())
}

fn key<T: Copy>(map: &HashMap<String, T>, name: &str) -> Result<T, Box<dyn Error>> {
    map.get(name)
        .copied()
        .ok_or_else(|| format!("seed has no record named {name:?}").into())
}

fn report(step: &str, outcome: Result<(), conclave_core::EnrollmentError>) {
    match outcome {
        Ok(()) => println!("   ✅ {step}"),
        Err(err) => println!("   ❌ {step}: {err} [{}]", err.kind()),
    }
}

async fn names(
    service: &EnrollmentService,
    ids: &[ParticipantId],
) -> Result<String, Box<dyn Error>> {
    let mut names = Vec::with_capacity(ids.len());
    for id in ids {
        names.push(service.participant(*id).await?.name);
    }
    Ok(if names.is_empty() {
        "nobody".to_string()
    } else {
        names.join(", ")
    })
}

async fn print_roster(service: &EnrollmentService, event: EventId) -> Result<(), Box<dyn Error>> {
    let roster = service.roster(event).await?;
    println!("   enrolled: {}", names(service, &roster.signed_up).await?);
    println!("   waiting:  {}", names(service, &roster.waitlist).await?);
    Ok(())
}
