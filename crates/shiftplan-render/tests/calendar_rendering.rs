//! Rendering of solver-produced calendars

use pretty_assertions::assert_eq;
use shiftplan_core::{BoundsInput, Calendar, Participant, PollSnapshot, Renderer, SlotTime};
use shiftplan_render::{excel::CellValue, ExcelRenderer, TextRenderer};
use shiftplan_solver::Planner;

/// Two weeks of morning and evening shifts, Mon/Tue/Thu
fn planned_calendar() -> Calendar {
    let slots = [
        "2025-03-03 08:00",
        "2025-03-03 17:00",
        "2025-03-04 08:00",
        "2025-03-06 17:00",
        "2025-03-10 08:00",
        "2025-03-11 17:00",
    ];
    let mut snapshot = PollSnapshot::new("Front desk");
    for slot in slots {
        snapshot = snapshot.slot(SlotTime::text(slot));
    }
    let snapshot = snapshot
        .participant(Participant::new("ann", "Ann").preferences(vec![1.0, 0.0, 1.0, 1.0, 1.0, 0.0]))
        .participant(Participant::new("bo", "Bo").preferences(vec![1.0, 1.0, 0.0, 0.0, 0.0, 1.0]))
        .participant(Participant::new("cy", "Cy").preferences(vec![0.0, 1.0, 1.0, 1.0, 1.0, 0.0]));

    Planner::default()
        .plan(&snapshot, &BoundsInput::new())
        .unwrap()
        .calendar
}

#[test]
fn text_output_has_one_row_per_day() {
    let calendar = planned_calendar();
    let text = TextRenderer::new().render(&calendar).unwrap();

    let table: Vec<&str> = text.lines().skip(2).take_while(|l| !l.is_empty()).collect();
    assert_eq!(table.len(), 1 + calendar.days.len());
    assert!(table[0].starts_with("Day"));
    assert!(table[0].ends_with("08:00  17:00"));
    assert!(text.contains("Objective: 0"));
}

#[test]
fn text_summary_matches_calendar_loads() {
    let calendar = planned_calendar();
    let text = TextRenderer::new().render(&calendar).unwrap();

    let total: usize = calendar.loads().iter().map(|l| l.shifts).sum();
    assert_eq!(total, 6);
    for load in calendar.loads() {
        assert!(text
            .lines()
            .any(|l| l.starts_with(&load.name) && l.ends_with(&load.shifts.to_string())));
    }
}

#[test]
fn excel_layout_covers_every_assignment() {
    let calendar = planned_calendar();
    let cells = ExcelRenderer::new().layout(&calendar);

    let names: Vec<&str> = calendar.people.iter().map(|p| p.name.as_str()).collect();
    let assigned = cells
        .iter()
        .filter(|c| c.col > 0)
        .filter(|c| matches!(&c.value, CellValue::Text(t) if names.contains(&t.as_str())))
        .count();
    assert_eq!(assigned, 6);

    let xlsx = ExcelRenderer::new().render(&calendar).unwrap();
    assert!(xlsx.len() > 100);
    assert_eq!(&xlsx[0..2], b"PK");
}
