use anyhow::Result;
use chrono::NaiveDate;
use maud::{html, Markup, PreEscaped, DOCTYPE};
use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use crate::calendar;
use crate::filter::{ExamFilters, FilterOptions};
use crate::types::{Exam, MonthlyCalendar, Semester};

const WEEKDAYS: [&str; 7] = ["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"];

/// Everything the page shows
pub struct PageView<'a> {
    /// Exams already filtered by `filters`
    pub exams: &'a [Exam],
    pub filters: &'a ExamFilters,
    pub options: &'a FilterOptions,
    /// Non-blocking banner, e.g. when the exam source was unavailable
    pub notice: Option<&'a str>,
}

/// Generate a static HTML file
pub fn generate_html(view: &PageView, path: &Path) -> Result<()> {
    let html = render_page(view);
    fs::write(path, html.into_string())?;
    Ok(())
}

pub fn render_page(view: &PageView) -> Markup {
    let months = calendar::build_calendar(view.exams);
    let exam_dates: BTreeSet<NaiveDate> = view.exams.iter().map(|e| e.exam_day).collect();

    html! {
        (DOCTYPE)
        html lang="en" {
            head {
                meta charset="UTF-8";
                meta name="viewport" content="width=device-width, initial-scale=1.0";
                title { "Exam calendar" }
                style { (PreEscaped(CSS)) }
            }
            body {
                div.container {
                    h1 { "Exam calendar" }
                    @if let Some(notice) = view.notice {
                        div.notice role="status" { (notice) }
                    }
                    (render_filters(view.filters, view.options))
                    div.stats {
                        span #"exam-count" { (view.exams.len()) }
                        " exams in "
                        span #"month-count" { (months.len()) }
                        " months"
                    }
                    @if months.is_empty() {
                        div.empty-state {
                            p { "No exams match the current filters." }
                        }
                    } @else {
                        div.months {
                            @for month in &months {
                                (render_month(month, view.exams))
                            }
                        }
                    }
                    @for date in &exam_dates {
                        template id=(format!("day-{}", date)) {
                            (render_day_panel(*date, &calendar::exams_on(view.exams, *date)))
                        }
                    }
                    div.exam-tooltip #"exam-tooltip" hidden {
                        div.tooltip-arrow {}
                        div.tooltip-body {}
                    }
                }
                script { (PreEscaped(JAVASCRIPT)) }
            }
        }
    }
}

fn render_filters(filters: &ExamFilters, options: &FilterOptions) -> Markup {
    let schools: Vec<(String, String)> = options
        .schools
        .iter()
        .map(|s| (s.clone(), s.clone()))
        .collect();
    let degrees: Vec<(String, String)> = options
        .degrees
        .iter()
        .map(|d| (d.clone(), d.clone()))
        .collect();
    let years: Vec<(String, String)> = options
        .course_years
        .iter()
        .map(|y| (y.to_string(), format!("Year {}", y)))
        .collect();
    let semesters: Vec<(String, String)> = options
        .semesters
        .iter()
        .map(|s| (s.to_string(), format!("Semester {}", s.label())))
        .collect();
    let subjects: Vec<(String, String)> = options
        .subjects
        .iter()
        .map(|s| {
            let label = match &s.acronym {
                Some(acronym) => format!("{} ({})", s.name, acronym),
                None => s.name.clone(),
            };
            (s.name.clone(), label)
        })
        .collect();

    html! {
        form.filters method="get" action="/" {
            (render_select("school", "School", filters.school.clone(), &schools))
            (render_select("degree", "Degree", filters.degree.clone(), &degrees))
            (render_select("year", "Year", filters.year.map(|y| y.to_string()), &years))
            (render_select("semester", "Semester", filters.semester.map(|s: Semester| s.to_string()), &semesters))
            (render_select("subject", "Subject", filters.subject.clone(), &subjects))
            label.filter {
                span { "Search" }
                input type="search" name="q" value=(filters.search.clone().unwrap_or_default()) placeholder="Subject, code or place";
            }
            div.filter-actions {
                button type="submit" { "Apply" }
                a.reset href="/" { "Reset" }
            }
        }
    }
}

fn render_select(
    name: &str,
    label: &str,
    current: Option<String>,
    choices: &[(String, String)],
) -> Markup {
    html! {
        label.filter {
            span { (label) }
            select name=(name) {
                option value="" selected[current.is_none()] { "All" }
                @for (value, text) in choices {
                    option value=(value) selected[current.as_deref() == Some(value.as_str())] { (text) }
                }
            }
        }
    }
}

fn render_month(month: &MonthlyCalendar, exams: &[Exam]) -> Markup {
    html! {
        section.month data-year=(month.year) data-month=(month.month) {
            h2.month-title { (month.month_name) " " (month.year) }
            table.calendar {
                thead {
                    tr {
                        @for weekday in WEEKDAYS {
                            th { (weekday) }
                        }
                    }
                }
                tbody {
                    @for week in &month.days {
                        tr {
                            @for cell in week {
                                @match cell {
                                    Some(day) => {
                                        @if day.has_exams {
                                            td {
                                                button.calendar-day-button.has-exams type="button" data-date=(day.date.to_string()) {
                                                    span.day-number { (day.day) }
                                                    span.exam-badge { (calendar::exam_count_on(exams, day.date)) }
                                                }
                                            }
                                        } @else {
                                            td {
                                                span.calendar-day { (day.day) }
                                            }
                                        }
                                    }
                                    None => {
                                        td.padding {}
                                    }
                                }
                            }
                        }
                    }
                }
            }
        }
    }
}

fn render_day_panel(date: NaiveDate, exams: &[&Exam]) -> Markup {
    html! {
        div.day-panel {
            div.day-panel-header { (date.format("%A %-d %B %Y").to_string()) }
            @for exam in exams {
                div.exam-item {
                    div.exam-subject {
                        (exam.short_name())
                        span.exam-code { (exam.subject_code) }
                    }
                    div.exam-name { (exam.subject_name) }
                    div.exam-meta {
                        (exam.exam_hour.format("%H:%M").to_string())
                        " · " (exam.duration_min) " min"
                        @if let Some(place) = &exam.exam_place {
                            " · " (place)
                        }
                    }
                    div.exam-degree {
                        (exam.degree)
                        " · Year " (exam.course_year)
                        " · Semester " (exam.semester.label())
                    }
                    @if let Some(comment) = &exam.comment {
                        div.exam-comment { (comment) }
                    }
                }
            }
        }
    }
}

const CSS: &str = r#"
* {
    margin: 0;
    padding: 0;
    box-sizing: border-box;
}

body {
    font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', sans-serif;
    background: #f5f6f8;
    color: #1d1f24;
    line-height: 1.4;
}

.container {
    max-width: 1100px;
    margin: 0 auto;
    padding: 32px 20px 60px;
}

h1 {
    font-size: 2.2em;
    font-weight: 800;
    margin-bottom: 20px;
}

.notice {
    background: #fff4e5;
    border: 1px solid #f0b45a;
    color: #7a4b00;
    padding: 10px 14px;
    border-radius: 6px;
    margin-bottom: 20px;
}

.filters {
    display: flex;
    flex-wrap: wrap;
    gap: 12px;
    align-items: flex-end;
    margin-bottom: 20px;
}

.filter {
    display: flex;
    flex-direction: column;
    font-size: 0.8em;
    font-weight: 600;
    text-transform: uppercase;
    color: #666;
    gap: 4px;
}

.filter select,
.filter input {
    font-size: 1.1em;
    padding: 6px 8px;
    min-width: 140px;
    max-width: 260px;
}

.filter-actions {
    display: flex;
    gap: 10px;
    align-items: center;
}

.stats {
    color: #666;
    font-size: 0.9em;
    margin-bottom: 24px;
}

.months {
    display: grid;
    grid-template-columns: repeat(auto-fill, minmax(320px, 1fr));
    gap: 24px;
}

.month {
    background: #fff;
    border-radius: 10px;
    padding: 16px;
    box-shadow: 0 1px 3px rgba(0,0,0,0.08);
}

.month-title {
    font-size: 1.1em;
    margin-bottom: 10px;
}

.calendar {
    width: 100%;
    border-collapse: collapse;
    table-layout: fixed;
}

.calendar th {
    font-size: 0.75em;
    color: #888;
    padding-bottom: 6px;
}

.calendar td {
    text-align: center;
    height: 40px;
}

.calendar-day {
    color: #999;
}

.calendar-day-button {
    position: relative;
    width: 36px;
    height: 36px;
    border: none;
    border-radius: 50%;
    background: #2b6cb0;
    color: #fff;
    font-weight: 700;
    cursor: pointer;
}

.exam-badge {
    position: absolute;
    top: -4px;
    right: -4px;
    font-size: 0.65em;
    background: #e53e3e;
    border-radius: 8px;
    padding: 0 4px;
}

.empty-state {
    text-align: center;
    color: #888;
    padding: 60px 0;
}

.exam-tooltip {
    position: absolute;
    width: 300px;
    max-height: 60vh;
    overflow: visible;
    background: #fff;
    border-radius: 8px;
    box-shadow: 0 6px 24px rgba(0,0,0,0.18);
    z-index: 10;
}

.tooltip-body {
    max-height: 60vh;
    overflow-y: auto;
    padding: 12px 14px;
}

.tooltip-arrow {
    position: absolute;
    width: 12px;
    height: 12px;
    margin: -6px 0 0 -6px;
    background: #fff;
}

.day-panel-header {
    font-weight: 700;
    margin-bottom: 8px;
}

.exam-item {
    padding: 8px 0;
    border-top: 1px solid #eee;
    font-size: 0.9em;
}

.exam-subject {
    font-weight: 700;
}

.exam-code {
    margin-left: 8px;
    color: #888;
    font-weight: 400;
}

.exam-meta,
.exam-degree,
.exam-comment {
    color: #555;
}
"#;

const JAVASCRIPT: &str = r#"
(function() {
    const tooltip = document.getElementById('exam-tooltip');
    const body = tooltip.querySelector('.tooltip-body');
    const arrow = tooltip.querySelector('.tooltip-arrow');
    let current = null;

    function geometry(target) {
        const rect = target.getBoundingClientRect();
        return {
            target: { top: rect.top, left: rect.left, width: rect.width, height: rect.height },
            tooltip: { width: tooltip.offsetWidth, height: tooltip.offsetHeight },
            viewport: { width: window.innerWidth, height: window.innerHeight },
            scroll: { x: window.pageXOffset, y: window.pageYOffset }
        };
    }

    // Below the target, kept 10px inside the window
    function fallback(target) {
        const rect = target.getBoundingClientRect();
        const maxLeft = window.innerWidth - tooltip.offsetWidth - 10;
        const maxTop = window.innerHeight - tooltip.offsetHeight - 10;
        const left = Math.max(10, Math.min(rect.left, maxLeft));
        const top = Math.max(10, Math.min(rect.bottom + 10, maxTop));
        tooltip.style.top = (top + window.pageYOffset) + 'px';
        tooltip.style.left = (left + window.pageXOffset) + 'px';
        tooltip.style.transformOrigin = 'top center';
        tooltip.dataset.placement = 'bottom';
        arrow.style.left = Math.max(5, Math.min(95, (rect.left + rect.width / 2 - left) / tooltip.offsetWidth * 100)) + '%';
        arrow.style.top = '0';
        arrow.style.transform = 'rotate(45deg)';
    }

    function reposition() {
        if (!current) return;
        const target = current;
        // Static build opened from disk: no server to ask
        if (location.protocol === 'file:') {
            fallback(target);
            return;
        }
        fetch('/api/tooltip', {
            method: 'POST',
            headers: { 'Content-Type': 'application/json' },
            body: JSON.stringify(geometry(target))
        })
            .then(r => r.ok ? r.json() : Promise.reject(r.status))
            .then(pos => {
                if (current !== target) return;
                tooltip.style.top = pos.top + 'px';
                tooltip.style.left = pos.left + 'px';
                tooltip.style.transformOrigin = pos.transformOrigin;
                tooltip.dataset.placement = pos.placement;
                arrow.style.left = pos.arrowLeft;
                arrow.style.top = pos.arrowTop;
                arrow.style.transform = 'rotate(' + pos.arrowRotationDeg + 'deg)';
            })
            .catch(() => fallback(target));
    }

    function show(button) {
        const template = document.getElementById('day-' + button.dataset.date);
        if (!template) return;
        body.replaceChildren(template.content.cloneNode(true));
        current = button;
        tooltip.hidden = false;
        reposition();
    }

    function hide() {
        current = null;
        tooltip.hidden = true;
    }

    document.querySelectorAll('.calendar-day-button').forEach(button => {
        button.addEventListener('click', event => {
            event.stopPropagation();
            if (current === button) {
                hide();
            } else {
                show(button);
            }
        });
    });

    document.addEventListener('click', event => {
        if (current && !tooltip.contains(event.target)) hide();
    });

    window.addEventListener('resize', reposition);
    window.addEventListener('scroll', reposition, { passive: true });

    document.querySelectorAll('.filters select').forEach(select => {
        select.addEventListener('change', () => select.form.submit());
    });
})();
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::make_exam;
    use tempfile::TempDir;

    fn render(exams: &[Exam], filters: &ExamFilters, notice: Option<&str>) -> String {
        let options = FilterOptions::from_exams(exams, filters);
        render_page(&PageView {
            exams,
            filters,
            options: &options,
            notice,
        })
        .into_string()
    }

    #[test]
    fn test_empty_page_shows_empty_state() {
        let html = render(&[], &ExamFilters::default(), None);

        assert!(html.contains("No exams match the current filters."));
        assert!(html.contains(r#"<span id="exam-count">0</span>"#));
        assert!(!html.contains("calendar-day-button has-exams"));
    }

    #[test]
    fn test_months_and_exam_days_rendered() {
        let exams = vec![
            make_exam("2024-01-15", "ETSINF CS", 1, 1),
            make_exam("2024-01-15", "ETSINF CS", 2, 1),
            make_exam("2024-03-10", "ETSINF CS", 1, 2),
        ];
        let html = render(&exams, &ExamFilters::default(), None);

        assert!(html.contains("January 2024"));
        assert!(html.contains("February 2024"));
        assert!(html.contains("March 2024"));
        assert!(html.contains(r#"data-date="2024-01-15""#));
        assert!(html.contains(r#"<span class="exam-badge">2</span>"#));
        assert!(html.contains(r#"<template id="day-2024-03-10">"#));
        assert!(html.contains(r#"<span id="month-count">3</span>"#));
    }

    #[test]
    fn test_day_panel_lists_exam_details() {
        let mut exam = make_exam("2025-01-15", "ETSINF Computer Engineering", 2, 2);
        exam.comment = Some("Bring ID".to_string());
        let html = render(&[exam], &ExamFilters::default(), None);

        assert!(html.contains("Wednesday 15 January 2025"));
        assert!(html.contains("ALG"));
        assert!(html.contains("09:00 · 120 min · 1G 0.1"));
        assert!(html.contains("Semester B"));
        assert!(html.contains("Bring ID"));
    }

    #[test]
    fn test_selected_filters_marked() {
        let exams = vec![
            make_exam("2025-01-15", "ETSINF CS", 1, 1),
            make_exam("2025-01-16", "ETSINF EE", 2, 2),
        ];
        let filters = ExamFilters {
            degree: Some("ETSINF EE".to_string()),
            semester: Some(Semester::Second),
            ..Default::default()
        };
        let html = render(&exams, &filters, None);

        assert!(html.contains(r#"<option value="ETSINF EE" selected>ETSINF EE</option>"#));
        assert!(html.contains(r#"<option value="2" selected>Semester B</option>"#));
        assert!(html.contains(r#"<option value="1">Semester A</option>"#));
    }

    #[test]
    fn test_notice_banner() {
        let html = render(&[], &ExamFilters::default(), Some("Exam source unavailable"));
        assert!(html.contains(r#"<div class="notice" role="status">Exam source unavailable</div>"#));
    }

    #[test]
    fn test_html_escapes_user_content() {
        let mut exam = make_exam("2025-01-15", "ETSINF CS", 1, 1);
        exam.subject_name = "<script>alert(1)</script>".to_string();
        exam.acronym = None;
        let html = render(&[exam], &ExamFilters::default(), None);

        assert!(!html.contains("<script>alert(1)</script>"));
        assert!(html.contains("&lt;script&gt;"));
    }

    #[test]
    fn test_generate_html_writes_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("index.html");
        let exams = vec![make_exam("2025-01-15", "ETSINF CS", 1, 1)];
        let filters = ExamFilters::default();
        let options = FilterOptions::from_exams(&exams, &filters);

        generate_html(
            &PageView {
                exams: &exams,
                filters: &filters,
                options: &options,
                notice: None,
            },
            &path,
        )
        .unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("<!DOCTYPE html>"));
        assert!(content.contains("January 2025"));
        // Opened from disk the page places tooltips without the server
        assert!(content.contains("location.protocol === 'file:'"));
        assert!(content.contains("function fallback(target)"));
    }
}
