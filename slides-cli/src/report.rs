use colored::*;
use slides::{ActionState, RunReport, SlideReport};
use std::path::Path;

pub fn print_header(script: &Path, slides: usize) {
    println!(
        "{} {} ({} slides)",
        "▶ RUNNING".cyan().bold(),
        script.display(),
        slides
    );
}

fn state_label(state: ActionState) -> ColoredString {
    match state {
        ActionState::Succeeded => "✅ SUCCEEDED".green().bold(),
        ActionState::Failed => "❌ FAILED".red().bold(),
        ActionState::Cancelled => "⏹  CANCELLED".yellow().bold(),
        ActionState::Pending | ActionState::Running => state.to_string().as_str().normal(),
    }
}

fn print_slide(slide: &SlideReport) {
    println!(
        "  Slide {:>3}  {}  {} elements in {}ms",
        slide.number,
        state_label(slide.state),
        slide.children,
        slide.elapsed_ms
    );
    for error in &slide.errors {
        println!("      {} {}", "skipped".yellow(), error);
    }
    if let Some(failure) = &slide.failure {
        let element = failure
            .element
            .map(|order| format!("element #{order}, "))
            .unwrap_or_default();
        println!(
            "      {} {}{} ({}): {}",
            "✗".red(),
            element,
            failure.action,
            failure.kind,
            failure.message
        );
    }
}

pub fn print_report(report: &RunReport) {
    println!();
    for slide in &report.slides {
        print_slide(slide);
    }
    if report.slides.is_empty() {
        if let Some(failure) = &report.failure {
            println!("  {} {}", "✗".red(), failure.message);
        }
    }
    println!("\n{} {}", "Run:".bold(), state_label(report.state));
}
