//! PDF export of a task plan.
//!
//! Pure rendering: the document layout is a deterministic function of the
//! task list and goal title (plus the generation date). Delivery writes the
//! bytes next to the caller's chosen directory, falling back to the system
//! temp directory when that fails.

use std::io::BufWriter;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Utc;
use printpdf::{
    BuiltinFont, Color, IndirectFontRef, Line, Mm, PdfDocument, PdfDocumentReference,
    PdfLayerIndex, PdfLayerReference, PdfPageIndex, Point, Rgb,
};

use planner_core::models::{Priority, Task};

const PAGE_WIDTH: f32 = 210.0;
const PAGE_HEIGHT: f32 = 297.0;
const MARGIN: f32 = 15.0;
const BOTTOM_MARGIN: f32 = 22.0;
const TITLE_WRAP: usize = 78;
const BODY_WRAP: usize = 95;

/// Renders the plan to PDF bytes: title block, goal + date header, one block
/// per task in order, page breaks when space runs out, and a page-numbered
/// footer on every page.
pub fn render(tasks: &[Task], goal_title: &str) -> Result<Vec<u8>> {
    let (doc, first_page, first_layer) = PdfDocument::new(
        "Smart Task Plan",
        Mm(PAGE_WIDTH),
        Mm(PAGE_HEIGHT),
        "content",
    );
    let regular = doc
        .add_builtin_font(BuiltinFont::Helvetica)
        .context("failed to load font")?;
    let bold = doc
        .add_builtin_font(BuiltinFont::HelveticaBold)
        .context("failed to load font")?;

    let date = format!("Generated on {}", Utc::now().format("%Y-%m-%d"));

    let pages = {
        let mut writer = PageWriter {
            doc: &doc,
            layer: doc.get_page(first_page).get_layer(first_layer),
            pages: vec![(first_page, first_layer)],
            y: PAGE_HEIGHT - MARGIN,
        };

        writer.text_line("Smart Task Plan", 22.0, &bold, rgb(0.12, 0.12, 0.43), 10.0);

        writer.layer.set_fill_color(rgb(0.0, 0.0, 0.0));
        writer.layer.use_text(
            format!("Goal: {goal_title}"),
            12.0,
            Mm(MARGIN),
            Mm(writer.y),
            &regular,
        );
        writer.layer.use_text(
            date.clone(),
            10.0,
            Mm(PAGE_WIDTH - MARGIN - estimated_width(&date, 10.0)),
            Mm(writer.y),
            &regular,
        );
        writer.y -= 7.0;
        writer.divider();

        for (index, task) in tasks.iter().enumerate() {
            writer.task_block(index, task, &regular, &bold);
        }

        writer.pages
    };

    let total = pages.len();
    for (number, (page, layer)) in pages.into_iter().enumerate() {
        let footer_layer = doc.get_page(page).get_layer(layer);
        footer_layer.set_fill_color(rgb(0.55, 0.55, 0.55));
        footer_layer.use_text(
            format!("{date} • Page {} of {total}", number + 1),
            9.0,
            Mm(MARGIN),
            Mm(10.0),
            &regular,
        );
    }

    let mut bytes = Vec::new();
    doc.save(&mut BufWriter::new(&mut bytes))
        .context("failed to serialize pdf")?;
    Ok(bytes)
}

/// Writes the rendered bytes as `task-plan-<millis>.pdf` under `primary_dir`,
/// falling back to the system temp directory. Both failing is an error for
/// the caller.
pub fn deliver(bytes: &[u8], primary_dir: &Path) -> Result<PathBuf> {
    let name = format!("task-plan-{}.pdf", Utc::now().timestamp_millis());
    let primary = primary_dir.join(&name);
    match std::fs::write(&primary, bytes) {
        Ok(()) => Ok(primary),
        Err(first) => {
            let fallback = std::env::temp_dir().join(&name);
            std::fs::write(&fallback, bytes).with_context(|| {
                format!(
                    "failed to write {} ({first}) and fallback {}",
                    primary.display(),
                    fallback.display()
                )
            })?;
            Ok(fallback)
        }
    }
}

struct PageWriter<'a> {
    doc: &'a PdfDocumentReference,
    layer: PdfLayerReference,
    pages: Vec<(PdfPageIndex, PdfLayerIndex)>,
    y: f32,
}

impl PageWriter<'_> {
    fn ensure_space(&mut self, needed: f32) {
        if self.y - needed < BOTTOM_MARGIN {
            let (page, layer) = self
                .doc
                .add_page(Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), "content");
            self.layer = self.doc.get_page(page).get_layer(layer);
            self.pages.push((page, layer));
            self.y = PAGE_HEIGHT - MARGIN;
        }
    }

    fn text_line(&mut self, text: &str, size: f32, font: &IndirectFontRef, color: Color, advance: f32) {
        self.ensure_space(advance);
        self.layer.set_fill_color(color);
        self.layer
            .use_text(text, size, Mm(MARGIN), Mm(self.y), font);
        self.y -= advance;
    }

    fn divider(&mut self) {
        self.layer.set_outline_color(rgb(0.78, 0.78, 0.78));
        self.layer.set_outline_thickness(0.5);
        self.layer.add_line(Line {
            points: vec![
                (Point::new(Mm(MARGIN), Mm(self.y)), false),
                (Point::new(Mm(PAGE_WIDTH - MARGIN), Mm(self.y)), false),
            ],
            is_closed: false,
        });
        self.y -= 5.0;
    }

    fn task_block(
        &mut self,
        index: usize,
        task: &Task,
        regular: &IndirectFontRef,
        bold: &IndirectFontRef,
    ) {
        let title = format!("{}. {}", index + 1, task.title);
        for line in wrap(&title, TITLE_WRAP) {
            self.text_line(&line, 12.0, bold, rgb(0.08, 0.08, 0.35), 6.0);
        }
        if let Some(description) = &task.description {
            for line in wrap(description, BODY_WRAP) {
                self.text_line(&line, 10.0, regular, rgb(0.24, 0.24, 0.24), 5.0);
            }
        }
        if let Some(deadline) = &task.deadline {
            self.text_line(
                &format!("Deadline: {deadline}"),
                10.0,
                regular,
                rgb(0.24, 0.24, 0.24),
                5.0,
            );
        }
        if let Some(category) = &task.category {
            self.text_line(
                &format!("Category: {category}"),
                10.0,
                regular,
                rgb(0.24, 0.24, 0.24),
                5.0,
            );
        }
        self.text_line(
            &format!("Priority: {}", task.priority.as_str()),
            11.0,
            bold,
            priority_color(task.priority),
            6.0,
        );
        if !task.dependencies.is_empty() {
            self.text_line(
                &format!("Dependencies: {}", task.dependencies.join(", ")),
                10.0,
                regular,
                rgb(0.35, 0.35, 0.35),
                5.0,
            );
        }
        self.y -= 3.0;
    }
}

fn rgb(r: f32, g: f32, b: f32) -> Color {
    Color::Rgb(Rgb::new(r, g, b, None))
}

fn priority_color(priority: Priority) -> Color {
    match priority {
        Priority::High => rgb(0.75, 0.14, 0.14),
        Priority::Medium => rgb(0.86, 0.47, 0.08),
        Priority::Low => rgb(0.12, 0.51, 0.12),
    }
}

/// Greedy word wrap by character count. Helvetica metrics are close enough
/// to monospace estimates at these sizes for a task list.
fn wrap(text: &str, width: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();
    for word in text.split_whitespace() {
        if !current.is_empty() && current.chars().count() + word.chars().count() + 1 > width {
            lines.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(word);
    }
    if !current.is_empty() {
        lines.push(current);
    }
    if lines.is_empty() {
        lines.push(String::new());
    }
    lines
}

fn estimated_width(text: &str, size: f32) -> f32 {
    // pt -> mm is 0.3528; average Helvetica glyph is about half the em.
    text.chars().count() as f32 * size * 0.5 * 0.3528
}
