/// Seat availability derived from enrollment counts
use crate::model::{Enrollment, Id, Section, Student};
use serde::Serialize;
use std::collections::HashSet;

/// Counts the enrollments that point at a section.
pub fn enrolled_count(section_id: Id, enrollments: &[Enrollment]) -> i64 {
    enrollments
        .iter()
        .filter(|e| e.section_id == section_id)
        .count() as i64
}

/// Remaining seats in a section.
///
/// Capacity is the override (the assigned room's capacity) when given, otherwise
/// the section's own capacity, otherwise 0. The result is not clamped: a negative
/// value means the section is over-enrolled.
pub fn remaining_seats(
    section: &Section,
    room_capacity_override: Option<u32>,
    enrollments: &[Enrollment],
) -> i64 {
    let capacity = room_capacity_override.or(section.capacity).unwrap_or(0);
    i64::from(capacity) - enrolled_count(section.id, enrollments)
}

/// Remaining seats for a section looked up by id.
///
/// A section that is not in `sections` counts as capacity 0. The assigned room's
/// capacity, when the section read carries one, takes precedence.
pub fn remaining_seats_by_id(section_id: Id, sections: &[Section], enrollments: &[Enrollment]) -> i64 {
    match sections.iter().find(|s| s.id == section_id) {
        Some(section) => remaining_seats(section, section.assigned_room_capacity(), enrollments),
        None => -enrolled_count(section_id, enrollments),
    }
}

/// Students not yet enrolled anywhere in the offering, in input order.
pub fn eligible_students<'a>(
    offering_id: Id,
    students: &'a [Student],
    enrollments: &[Enrollment],
) -> Vec<&'a Student> {
    let enrolled: HashSet<Id> = enrollments
        .iter()
        .filter(|e| e.offering_id == offering_id)
        .map(|e| e.student_id)
        .collect();

    students
        .iter()
        .filter(|s| !enrolled.contains(&s.id))
        .collect()
}

/// A section that still has seats, with the computed count for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SelectableSection<'a> {
    pub section: &'a Section,
    pub remaining_seats: i64,
}

/// Sections of the offering with at least one free seat, in input order.
pub fn selectable_sections<'a>(
    offering_id: Id,
    sections: &'a [Section],
    enrollments: &[Enrollment],
) -> Vec<SelectableSection<'a>> {
    sections
        .iter()
        .filter(|s| s.offering_id == offering_id)
        .map(|section| SelectableSection {
            section,
            remaining_seats: remaining_seats(
                section,
                section.assigned_room_capacity(),
                enrollments,
            ),
        })
        .filter(|s| s.remaining_seats > 0)
        .collect()
}
