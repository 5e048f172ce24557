//! Page layout in millimetres from the top-left corner, with overflow
//! pagination and footers stamped once the page count is known.

pub const PAGE_WIDTH_MM: f32 = 210.0;
pub const PAGE_HEIGHT_MM: f32 = 297.0;

pub const SAFE_TOP_MM: f32 = 50.0;
pub const SAFE_BOTTOM_MM: f32 = 255.0;
/// First baseline on a page opened by overflow.
pub const CONTINUE_TOP_MM: f32 = SAFE_TOP_MM + 10.0;

pub const FOOTER_X_MM: f32 = 105.0;
pub const FOOTER_Y_MM: f32 = 283.0;
pub const FOOTER_SIZE_PT: f32 = 9.0;

pub fn mm_to_pt(mm: f32) -> f32 {
    mm * 72.0 / 25.4
}

pub fn pt_to_mm(pt: f32) -> f32 {
    pt * 25.4 / 72.0
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb(pub u8, pub u8, pub u8);

impl Rgb {
    pub fn unit(self) -> [f32; 3] {
        [
            self.0 as f32 / 255.0,
            self.1 as f32 / 255.0,
            self.2 as f32 / 255.0,
        ]
    }
}

pub const TEXT_DARK: Rgb = Rgb(10, 10, 10);
pub const MUTED: Rgb = Rgb(120, 120, 120);
pub const GREEN: Rgb = Rgb(34, 197, 94);
pub const AMBER: Rgb = Rgb(234, 179, 8);
pub const RED: Rgb = Rgb(239, 68, 68);
pub const RULE: Rgb = Rgb(200, 200, 200);

pub trait TextMeasure {
    fn text_width_pt(&self, text: &str, size_pt: f32) -> f32;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Align {
    Left,
    Center,
    Right,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Mark {
    /// `x_mm` is the resolved left edge, `y_mm` the baseline.
    Text {
        text: String,
        x_mm: f32,
        y_mm: f32,
        size_pt: f32,
        color: Rgb,
        footer: bool,
    },
    Line {
        x1_mm: f32,
        y1_mm: f32,
        x2_mm: f32,
        y2_mm: f32,
        width_pt: f32,
        color: Rgb,
    },
    Rect {
        x_mm: f32,
        y_mm: f32,
        w_mm: f32,
        h_mm: f32,
        width_pt: f32,
        color: Rgb,
    },
}

/// Greedy word wrap. Explicit newlines start a new line; a single word wider
/// than the limit is kept whole on its own line.
pub fn wrap_lines<M: TextMeasure + ?Sized>(
    measure: &M,
    text: &str,
    max_width_pt: f32,
    size_pt: f32,
) -> Vec<String> {
    let mut out = Vec::new();
    for paragraph in text.split('\n') {
        let mut line = String::new();
        for word in paragraph.split_whitespace() {
            if line.is_empty() {
                line.push_str(word);
                continue;
            }
            let candidate = format!("{} {}", line, word);
            if measure.text_width_pt(&candidate, size_pt) <= max_width_pt {
                line = candidate;
            } else {
                out.push(std::mem::replace(&mut line, word.to_string()));
            }
        }
        out.push(line);
    }
    out
}

pub struct Layout<'m, M: TextMeasure + ?Sized> {
    measure: &'m M,
    pages: Vec<Vec<Mark>>,
}

impl<'m, M: TextMeasure + ?Sized> Layout<'m, M> {
    pub fn new(measure: &'m M) -> Self {
        Self {
            measure,
            pages: vec![Vec::new()],
        }
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn new_page(&mut self) {
        self.pages.push(Vec::new());
    }

    fn push(&mut self, mark: Mark) {
        if let Some(page) = self.pages.last_mut() {
            page.push(mark);
        }
    }

    pub fn width_mm(&self, text: &str, size_pt: f32) -> f32 {
        pt_to_mm(self.measure.text_width_pt(text, size_pt))
    }

    pub fn text(&mut self, text: &str, x_mm: f32, y_mm: f32, size_pt: f32, color: Rgb, align: Align) {
        self.place(text, x_mm, y_mm, size_pt, color, align, false);
    }

    #[allow(clippy::too_many_arguments)]
    fn place(
        &mut self,
        text: &str,
        x_mm: f32,
        y_mm: f32,
        size_pt: f32,
        color: Rgb,
        align: Align,
        footer: bool,
    ) {
        if text.is_empty() {
            return;
        }
        let left = match align {
            Align::Left => x_mm,
            Align::Center => x_mm - self.width_mm(text, size_pt) / 2.0,
            Align::Right => x_mm - self.width_mm(text, size_pt),
        };
        self.push(Mark::Text {
            text: text.to_string(),
            x_mm: left,
            y_mm,
            size_pt,
            color,
            footer,
        });
    }

    pub fn line(&mut self, x1_mm: f32, y1_mm: f32, x2_mm: f32, y2_mm: f32, width_pt: f32, color: Rgb) {
        self.push(Mark::Line {
            x1_mm,
            y1_mm,
            x2_mm,
            y2_mm,
            width_pt,
            color,
        });
    }

    pub fn rect(&mut self, x_mm: f32, y_mm: f32, w_mm: f32, h_mm: f32, width_pt: f32, color: Rgb) {
        self.push(Mark::Rect {
            x_mm,
            y_mm,
            w_mm,
            h_mm,
            width_pt,
            color,
        });
    }

    pub fn wrap(&self, text: &str, max_width_mm: f32, size_pt: f32) -> Vec<String> {
        wrap_lines(self.measure, text, mm_to_pt(max_width_mm), size_pt)
    }

    /// Opens a new page when a block of `required_mm` starting at `y_mm` would
    /// cross the safe bottom. Returns the y to continue from.
    pub fn ensure_space(&mut self, y_mm: f32, required_mm: f32) -> f32 {
        if y_mm + required_mm > SAFE_BOTTOM_MM {
            self.new_page();
            CONTINUE_TOP_MM
        } else {
            y_mm
        }
    }

    /// Wrapped text placed line by line; a line that would fall below the safe
    /// bottom moves to a fresh page. Returns the y after the last line.
    #[allow(clippy::too_many_arguments)]
    pub fn paragraph(
        &mut self,
        text: &str,
        x_mm: f32,
        y_mm: f32,
        max_width_mm: f32,
        size_pt: f32,
        line_height_mm: f32,
        color: Rgb,
    ) -> f32 {
        let mut y = y_mm;
        for line in self.wrap(text, max_width_mm, size_pt) {
            if y > SAFE_BOTTOM_MM {
                self.new_page();
                y = CONTINUE_TOP_MM;
            }
            self.text(&line, x_mm, y, size_pt, color, Align::Left);
            y += line_height_mm;
        }
        y
    }

    /// Second pass: stamps "k из N" on every page.
    pub fn finish(mut self) -> Vec<Vec<Mark>> {
        let total = self.pages.len();
        let labels: Vec<String> = (1..=total).map(|k| format!("{} из {}", k, total)).collect();
        let measure = self.measure;
        for (page, label) in self.pages.iter_mut().zip(labels) {
            let width = pt_to_mm(measure.text_width_pt(&label, FOOTER_SIZE_PT));
            page.push(Mark::Text {
                text: label,
                x_mm: FOOTER_X_MM - width / 2.0,
                y_mm: FOOTER_Y_MM,
                size_pt: FOOTER_SIZE_PT,
                color: MUTED,
                footer: true,
            });
        }
        self.pages
    }
}
