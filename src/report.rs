//! Console rendering of mutation steps and query results.
//!
//! One line per record; numeric results use two decimals.

use crate::error::Result;
use crate::mutation::{MutationAction, MutationStep};
use crate::query::{QueryReport, QueryThresholds};
use crate::store::Member;
use std::io::{self, Write};

const RULE_WIDTH: usize = 25;

fn member_json(member: &Member) -> String {
    serde_json::to_string(member).unwrap_or_else(|_| format!("{:?}", member))
}

fn write_members<W: Write>(out: &mut W, members: &Result<Vec<Member>>) -> io::Result<()> {
    match members {
        Ok(members) => {
            for member in members {
                writeln!(out, " - {}", member_json(member))?;
            }
        }
        Err(e) => writeln!(out, " ! could not read members: {}", e)?,
    }
    Ok(())
}

fn write_failure<W: Write, T>(out: &mut W, result: &Result<T>) -> io::Result<bool> {
    match result {
        Ok(_) => Ok(false),
        Err(e) => {
            writeln!(out, "   ! {}", e)?;
            Ok(true)
        }
    }
}

pub fn render_mutations<W: Write>(out: &mut W, steps: &[MutationStep]) -> io::Result<()> {
    writeln!(out, "=== MUTATIONS ===")?;
    writeln!(out)?;
    for step in steps {
        match (&step.outcome, step.action) {
            (Ok(_), MutationAction::Insert) => writeln!(out, "Member inserted. Members:")?,
            (Ok(_), MutationAction::Modify) => writeln!(out, "Member modified. Members:")?,
            (Ok(_), MutationAction::Delete) => writeln!(out, "Member deleted. Members:")?,
            (Err(e), action) => writeln!(out, "{} failed: {}. Members:", action, e)?,
        }
        write_members(out, &step.members_after)?;
        writeln!(out, "{}", "-".repeat(RULE_WIDTH))?;
    }
    writeln!(out)
}

pub fn render_queries<W: Write>(
    out: &mut W,
    report: &QueryReport,
    thresholds: &QueryThresholds,
) -> io::Result<()> {
    writeln!(out, "=== QUERIES ===")?;
    writeln!(out)?;

    match &report.average_age {
        Ok(average) => writeln!(out, "a) Average age: {:.2} years", average)?,
        Err(e) => writeln!(out, "a) Average age: ! {}", e)?,
    }

    writeln!(
        out,
        "b) Members with level >= {} and age > {}:",
        thresholds.min_level, thresholds.older_than
    )?;
    if !write_failure(out, &report.members_by_level_and_age)? {
        for member in report.members_by_level_and_age.iter().flatten() {
            writeln!(out, "   - {}", member.name)?;
        }
    }

    writeln!(
        out,
        "c) Happy-hour spend > {:.2}:",
        thresholds.high_spend_threshold
    )?;
    if !write_failure(out, &report.high_spenders)? {
        for spender in report.high_spenders.iter().flatten() {
            writeln!(
                out,
                "   - ID: {} | Name: {} | Total: {:.2}",
                spender.member_id, spender.name, spender.total
            )?;
        }
    }

    match &report.average_happy_hour_spend {
        Ok(average) => writeln!(out, "d) Average happy-hour spend: {:.2}", average)?,
        Err(e) => writeln!(out, "d) Average happy-hour spend: ! {}", e)?,
    }

    writeln!(
        out,
        "e) Purchases longer than {} min (sorted):",
        thresholds.long_purchase_minutes
    )?;
    if !write_failure(out, &report.long_purchases)? {
        for member in report.long_purchases.iter().flatten() {
            writeln!(out, "   - {}", member.name)?;
        }
    }

    writeln!(out, "f) Members with {} card:", thresholds.card)?;
    if !write_failure(out, &report.black_card_members)? {
        for member in report.black_card_members.iter().flatten() {
            writeln!(out, "   - {}", member_json(member))?;
        }
    }

    Ok(())
}
