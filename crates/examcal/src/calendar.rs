//! Month-grid generation for the exam calendar.
//!
//! Grids are pure values rebuilt from the (already filtered) exam list every
//! time the list changes. Weeks start on Monday and always hold 7 slots;
//! slots outside the month are `None`.

use chrono::{Datelike, Months, NaiveDate};
use std::collections::BTreeSet;

use crate::types::{Exam, ExamDay, MonthlyCalendar, Week};

/// Build one `MonthlyCalendar` per month spanned by the exam dates.
///
/// Months run from the month of the earliest exam through the month of the
/// latest, inclusive. Months inside the range without exams are still
/// produced, they just have no highlighted day. An empty input yields no months.
pub fn build_calendar(exams: &[Exam]) -> Vec<MonthlyCalendar> {
    let dates: BTreeSet<NaiveDate> = exams.iter().map(|exam| exam.exam_day).collect();

    let (Some(&min), Some(&max)) = (dates.first(), dates.last()) else {
        return Vec::new();
    };

    let last = first_of_month(max);
    let mut cursor = first_of_month(min);
    let mut months = Vec::new();

    while cursor <= last {
        if let Some(month) = build_month(cursor.year(), cursor.month0(), &dates) {
            months.push(month);
        }
        cursor = match cursor.checked_add_months(Months::new(1)) {
            Some(next) => next,
            None => break,
        };
    }

    months
}

/// Build the week grid of a single month. `month0` is zero-based.
///
/// Returns `None` if `year`/`month0` do not name a representable month.
pub fn build_month(year: i32, month0: u32, dates: &BTreeSet<NaiveDate>) -> Option<MonthlyCalendar> {
    let first = NaiveDate::from_ymd_opt(year, month0.checked_add(1)?, 1)?;
    let leading = first.weekday().num_days_from_monday() as usize;

    let mut weeks: Vec<Week> = Vec::new();
    let mut week: Week = [None; 7];
    let mut slot = leading;

    for date in first.iter_days().take_while(|d| d.month() == first.month()) {
        week[slot] = Some(ExamDay {
            date,
            day: date.day(),
            has_exams: dates.contains(&date),
        });
        slot += 1;

        if slot == 7 {
            weeks.push(week);
            week = [None; 7];
            slot = 0;
        }
    }

    // Partial last week keeps its trailing padding
    if slot > 0 {
        weeks.push(week);
    }

    Some(MonthlyCalendar {
        year,
        month: month0,
        month_name: first.format("%B").to_string(),
        days: weeks,
    })
}

/// Exams scheduled on `date`, ordered by start time.
pub fn exams_on(exams: &[Exam], date: NaiveDate) -> Vec<&Exam> {
    let mut day: Vec<&Exam> = exams.iter().filter(|exam| exam.exam_day == date).collect();
    day.sort_by_key(|exam| exam.exam_hour);
    day
}

/// Number of exams scheduled on `date`.
pub fn exam_count_on(exams: &[Exam], date: NaiveDate) -> usize {
    exams.iter().filter(|exam| exam.exam_day == date).count()
}

/// Plain-text month grid, one line per week. Days with exams carry a `*`.
pub fn format_month(month: &MonthlyCalendar) -> String {
    let header: Vec<String> = ["Mo", "Tu", "We", "Th", "Fr", "Sa", "Su"]
        .iter()
        .map(|d| format!("{:>2} ", d))
        .collect();

    let mut out = format!("{} {}\n{}\n", month.month_name, month.year, header.join(" ").trim_end());
    for week in &month.days {
        let cells: Vec<String> = week
            .iter()
            .map(|cell| match cell {
                Some(day) if day.has_exams => format!("{:>2}*", day.day),
                Some(day) => format!("{:>2} ", day.day),
                None => "   ".to_string(),
            })
            .collect();
        out.push_str(cells.join(" ").trim_end());
        out.push('\n');
    }
    out
}

fn first_of_month(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::make_exam;
    use chrono::NaiveTime;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn exams_on_days(days: &[&str]) -> Vec<Exam> {
        days.iter()
            .map(|d| make_exam(d, "ETSINF CS", 1, 1))
            .collect()
    }

    fn highlighted(month: &MonthlyCalendar) -> Vec<u32> {
        month
            .exam_days()
            .filter(|d| d.has_exams)
            .map(|d| d.day)
            .collect()
    }

    #[test]
    fn test_empty_input_yields_no_months() {
        assert!(build_calendar(&[]).is_empty());
    }

    #[test]
    fn test_single_exam_single_month() {
        let months = build_calendar(&exams_on_days(&["2025-01-15"]));

        assert_eq!(months.len(), 1);
        assert_eq!(months[0].year, 2025);
        assert_eq!(months[0].month, 0);
        assert_eq!(months[0].month_name, "January");
        assert_eq!(highlighted(&months[0]), vec![15]);
    }

    #[test]
    fn test_month_span_includes_empty_months() {
        let months = build_calendar(&exams_on_days(&["2024-01-15", "2024-03-10"]));

        assert_eq!(months.len(), 3);
        let names: Vec<&str> = months.iter().map(|m| m.month_name.as_str()).collect();
        assert_eq!(names, vec!["January", "February", "March"]);
        assert_eq!(highlighted(&months[0]), vec![15]);
        assert!(highlighted(&months[1]).is_empty());
        assert_eq!(highlighted(&months[2]), vec![10]);
    }

    #[test]
    fn test_span_crosses_year_boundary() {
        let months = build_calendar(&exams_on_days(&["2024-12-20", "2025-02-03"]));

        let ym: Vec<(i32, u32)> = months.iter().map(|m| (m.year, m.month)).collect();
        assert_eq!(ym, vec![(2024, 11), (2025, 0), (2025, 1)]);
    }

    #[test]
    fn test_input_order_does_not_matter() {
        let a = build_calendar(&exams_on_days(&["2024-03-10", "2024-01-15"]));
        let b = build_calendar(&exams_on_days(&["2024-01-15", "2024-03-10"]));
        assert_eq!(a, b);
    }

    #[test]
    fn test_duplicate_dates_count_once() {
        let months = build_calendar(&exams_on_days(&["2025-01-15", "2025-01-15", "2025-01-15"]));
        assert_eq!(highlighted(&months[0]), vec![15]);
    }

    #[test]
    fn test_weeks_always_have_seven_slots_and_start_on_monday() {
        let months = build_calendar(&exams_on_days(&["2024-01-01", "2024-12-31"]));
        assert_eq!(months.len(), 12);

        for month in &months {
            for week in &month.days {
                assert_eq!(week.len(), 7);
                for (idx, cell) in week.iter().enumerate() {
                    if let Some(day) = cell {
                        assert_eq!(day.date.weekday().num_days_from_monday() as usize, idx);
                    }
                }
            }
        }
    }

    #[test]
    fn test_leading_padding_matches_first_weekday() {
        // 2025-01-01 is a Wednesday
        let months = build_calendar(&exams_on_days(&["2025-01-01"]));
        let first_week = &months[0].days[0];

        assert!(first_week[0].is_none());
        assert!(first_week[1].is_none());
        assert_eq!(first_week[2].map(|d| d.day), Some(1));
    }

    #[test]
    fn test_month_starting_on_monday_has_no_leading_padding() {
        // 2024-01-01 is a Monday
        let months = build_calendar(&exams_on_days(&["2024-01-01"]));
        assert_eq!(months[0].days[0][0].map(|d| d.day), Some(1));
    }

    #[test]
    fn test_trailing_padding_on_last_week() {
        // January 2025 ends on a Friday
        let months = build_calendar(&exams_on_days(&["2025-01-31"]));
        let last_week = months[0].days.last().unwrap();

        assert_eq!(last_week[4].map(|d| d.day), Some(31));
        assert!(last_week[5].is_none());
        assert!(last_week[6].is_none());
    }

    #[test]
    fn test_february_2021_fits_in_four_weeks() {
        // Starts Monday, 28 days
        let months = build_calendar(&exams_on_days(&["2021-02-10"]));
        assert_eq!(months[0].days.len(), 4);
        assert!(months[0].days.iter().all(|w| w.iter().all(|c| c.is_some())));
    }

    #[test]
    fn test_leap_february_has_29_days() {
        let months = build_calendar(&exams_on_days(&["2024-02-29"]));
        assert_eq!(months[0].exam_days().count(), 29);
        assert_eq!(highlighted(&months[0]), vec![29]);
    }

    #[test]
    fn test_every_date_in_range_appears_exactly_once() {
        let months = build_calendar(&exams_on_days(&["2024-01-15", "2024-03-10"]));

        let all: Vec<NaiveDate> = months.iter().flat_map(|m| m.exam_days().map(|d| d.date)).collect();
        let unique: BTreeSet<NaiveDate> = all.iter().copied().collect();

        assert_eq!(all.len(), unique.len());
        assert_eq!(all.len(), 31 + 29 + 31);
        assert!(all.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_highlighted_dates_reproduce_input_dates() {
        let days = ["2025-01-15", "2025-01-20", "2025-02-03", "2025-02-03", "2025-04-30"];
        let months = build_calendar(&exams_on_days(&days));

        let got: BTreeSet<NaiveDate> = months
            .iter()
            .flat_map(|m| m.exam_days().filter(|d| d.has_exams).map(|d| d.date))
            .collect();
        let expected: BTreeSet<NaiveDate> = days.iter().map(|d| date(d)).collect();

        assert_eq!(got, expected);
    }

    #[test]
    fn test_build_month_rejects_invalid_month() {
        assert!(build_month(2025, 12, &BTreeSet::new()).is_none());
        assert!(build_month(2025, u32::MAX, &BTreeSet::new()).is_none());
    }

    #[test]
    fn test_format_month_text() {
        let months = build_calendar(&exams_on_days(&["2025-01-15"]));
        let text = format_month(&months[0]);
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines[0], "January 2025");
        assert_eq!(lines[1], "Mo  Tu  We  Th  Fr  Sa  Su");
        assert_eq!(lines[2], "         1   2   3   4   5");
        assert_eq!(lines[4], "13  14  15* 16  17  18  19");
        assert_eq!(lines.len(), 2 + months[0].days.len());
    }

    #[test]
    fn test_exams_on_sorted_by_hour() {
        let mut late = make_exam("2025-01-15", "ETSINF CS", 1, 1);
        late.exam_hour = NaiveTime::from_hms_opt(16, 0, 0).unwrap();
        late.subject_name = "Late".to_string();
        let mut early = make_exam("2025-01-15", "ETSINF CS", 1, 1);
        early.exam_hour = NaiveTime::from_hms_opt(8, 30, 0).unwrap();
        early.subject_name = "Early".to_string();
        let other = make_exam("2025-01-16", "ETSINF CS", 1, 1);

        let exams = vec![late, other, early];
        let day = exams_on(&exams, date("2025-01-15"));

        assert_eq!(day.len(), 2);
        assert_eq!(day[0].subject_name, "Early");
        assert_eq!(day[1].subject_name, "Late");
        assert_eq!(exam_count_on(&exams, date("2025-01-15")), 2);
        assert_eq!(exam_count_on(&exams, date("2025-01-17")), 0);
    }
}
