use opd_queue_cell::{AllocationEngine, SlotStatus, TokenSource};

use crate::simulation::SimulationStats;

fn source_marker(source: TokenSource) -> &'static str {
    match source {
        TokenSource::Priority => "[EMG]",
        TokenSource::Followup => "[FUP]",
        TokenSource::Online => "[ONL]",
        TokenSource::Walkin => "[WLK]",
    }
}

fn utilization_bar(utilization: f64) -> String {
    let filled = ((utilization / 5.0).floor() as usize).min(20);
    format!("{}{}", "#".repeat(filled), ".".repeat(20 - filled))
}

pub fn print_schedule(engine: &AllocationEngine) {
    println!("\n=== Final OPD Schedule ===");

    for doctor in engine.doctors() {
        println!("\n{}", doctor.name);
        println!("{}", "=".repeat(doctor.name.len()));
        println!(
            "Utilization: {:.1}% ({}/{})",
            doctor.utilization(),
            doctor.allocated_tokens(),
            doctor.total_capacity()
        );

        for slot in &doctor.slots {
            let status = match slot.status() {
                SlotStatus::Full => "FULL ",
                SlotStatus::Delayed => "DELAY",
                SlotStatus::Available => "OPEN ",
            };
            let delay = if slot.delay_minutes > 0 {
                format!(" +{}min delay", slot.delay_minutes)
            } else {
                String::new()
            };
            println!("\n  {} {} [{}/{}]{}", status, slot.slot_time, slot.allocated(), slot.capacity, delay);

            for token in slot.token_ids().iter().filter_map(|id| engine.get_token(id).ok()) {
                println!(
                    "    {} #{} {} ({}) - est: {}",
                    source_marker(token.source),
                    token.token_number.unwrap_or_default(),
                    token.patient_name,
                    token.source.as_str(),
                    token.estimated_time.as_deref().unwrap_or("N/A")
                );
            }
        }
    }
}

pub fn print_statistics(engine: &AllocationEngine, stats: &SimulationStats) {
    println!("\n\n=== Simulation Statistics ===");
    println!("Total token requests:   {}", stats.total_requests);
    println!(
        "Successful allocations: {} ({:.1}%)",
        stats.successful_allocations,
        stats.success_rate()
    );
    println!("Waitlisted:             {}", stats.waitlisted);
    println!("Cancellations:          {} ({} reallocated)", stats.cancellations, stats.reallocations);
    println!(
        "Emergency insertions:   {} ({} displaced, {} denied)",
        stats.emergencies, stats.displaced, stats.emergencies_denied
    );
    println!("Delays:                 {}", stats.delays);

    let status = engine.status();
    println!("\nCurrent system state:");
    println!("Registered tokens:      {}", status.total_tokens);
    println!("Waiting list:           {}", status.waiting_list);

    println!("\nDoctor utilization:");
    for doctor in &status.doctors {
        println!(
            "  {:<30} [{}] {:.1}%",
            doctor.name,
            utilization_bar(doctor.utilization),
            doctor.utilization
        );
    }
}
