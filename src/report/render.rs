use super::font::{ReportFont, FONT_RESOURCE};
use super::layout::{mm_to_pt, Mark, PAGE_HEIGHT_MM, PAGE_WIDTH_MM};
use super::ReportError;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream};

fn lopdf_err(code: &'static str) -> impl Fn(lopdf::Error) -> ReportError {
    move |e| ReportError::new(code, e.to_string())
}

fn real(v: f32) -> Object {
    Object::Real(v.into())
}

fn number(o: &Object) -> Option<f32> {
    match o {
        Object::Integer(i) => Some(*i as f32),
        Object::Real(r) => Some(*r as f32),
        _ => None,
    }
}

fn resolve_dict(doc: &Document, o: &Object) -> Option<Dictionary> {
    match o {
        Object::Dictionary(d) => Some(d.clone()),
        Object::Reference(id) => doc.get_dictionary(*id).ok().cloned(),
        _ => None,
    }
}

/// Looks a key up on the page, then along its Parent chain.
fn inherited(doc: &Document, page: &Dictionary, key: &[u8]) -> Option<Object> {
    let mut cur = page.clone();
    for _ in 0..32 {
        if let Ok(v) = cur.get(key) {
            return Some(v.clone());
        }
        let parent = cur.get(b"Parent").ok()?.as_reference().ok()?;
        cur = doc.get_dictionary(parent).ok()?.clone();
    }
    None
}

/// Background shared by every output page.
struct Base {
    doc: Document,
    pages_id: ObjectId,
    page: Dictionary,
    resources: Dictionary,
    contents: Vec<Object>,
    height_pt: f32,
    from_template: bool,
}

fn blank_base() -> Base {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let width = mm_to_pt(PAGE_WIDTH_MM);
    let height = mm_to_pt(PAGE_HEIGHT_MM);
    let page = dictionary! {
        "Type" => "Page",
        "MediaBox" => vec![real(0.0), real(0.0), real(width), real(height)],
    };
    Base {
        doc,
        pages_id,
        page,
        resources: Dictionary::new(),
        contents: Vec::new(),
        height_pt: height,
        from_template: false,
    }
}

fn template_base(bytes: &[u8]) -> Result<Base, ReportError> {
    let doc = Document::load_mem(bytes).map_err(lopdf_err("template_load_failed"))?;
    let first = doc
        .get_pages()
        .get(&1)
        .copied()
        .ok_or_else(|| ReportError::new("template_load_failed", "template has no pages"))?;
    let root_id = doc
        .trailer
        .get(b"Root")
        .and_then(|o| o.as_reference())
        .map_err(lopdf_err("template_load_failed"))?;
    let pages_id = doc
        .get_dictionary(root_id)
        .and_then(|d| d.get(b"Pages"))
        .and_then(|o| o.as_reference())
        .map_err(lopdf_err("template_load_failed"))?;
    let mut page = doc
        .get_dictionary(first)
        .map_err(lopdf_err("template_load_failed"))?
        .clone();

    let media_box = inherited(&doc, &page, b"MediaBox")
        .and_then(|o| match o {
            Object::Array(a) => Some(a),
            Object::Reference(id) => doc.get_object(id).ok()?.as_array().ok().cloned(),
            _ => None,
        })
        .ok_or_else(|| ReportError::new("template_load_failed", "template page has no MediaBox"))?;
    let nums: Vec<f32> = media_box.iter().filter_map(number).collect();
    if nums.len() != 4 {
        return Err(ReportError::new("template_load_failed", "malformed MediaBox"));
    }
    let height_pt = nums[3] - nums[1];

    let resources = inherited(&doc, &page, b"Resources")
        .and_then(|o| resolve_dict(&doc, &o))
        .unwrap_or_default();
    let contents = match page.get(b"Contents") {
        Ok(Object::Array(items)) => items.clone(),
        Ok(Object::Reference(id)) => vec![Object::Reference(*id)],
        _ => Vec::new(),
    };

    page.set("MediaBox", Object::Array(media_box));
    page.remove(b"Annots");
    Ok(Base {
        doc,
        pages_id,
        page,
        resources,
        contents,
        height_pt,
        from_template: true,
    })
}

fn overlay_ops(marks: &[Mark], font: &mut ReportFont, height_pt: f32) -> Vec<Operation> {
    let mut ops = Vec::new();
    for mark in marks {
        match mark {
            Mark::Text {
                text,
                x_mm,
                y_mm,
                size_pt,
                color,
                ..
            } => {
                let [r, g, b] = color.unit();
                ops.push(Operation::new("BT", vec![]));
                ops.push(Operation::new(
                    "Tf",
                    vec![Object::Name(FONT_RESOURCE.as_bytes().to_vec()), real(*size_pt)],
                ));
                ops.push(Operation::new("rg", vec![real(r), real(g), real(b)]));
                ops.push(Operation::new(
                    "Td",
                    vec![real(mm_to_pt(*x_mm)), real(height_pt - mm_to_pt(*y_mm))],
                ));
                ops.push(Operation::new("Tj", vec![font.encode(text)]));
                ops.push(Operation::new("ET", vec![]));
            }
            Mark::Line {
                x1_mm,
                y1_mm,
                x2_mm,
                y2_mm,
                width_pt,
                color,
            } => {
                let [r, g, b] = color.unit();
                ops.push(Operation::new("RG", vec![real(r), real(g), real(b)]));
                ops.push(Operation::new("w", vec![real(*width_pt)]));
                ops.push(Operation::new(
                    "m",
                    vec![real(mm_to_pt(*x1_mm)), real(height_pt - mm_to_pt(*y1_mm))],
                ));
                ops.push(Operation::new(
                    "l",
                    vec![real(mm_to_pt(*x2_mm)), real(height_pt - mm_to_pt(*y2_mm))],
                ));
                ops.push(Operation::new("S", vec![]));
            }
            Mark::Rect {
                x_mm,
                y_mm,
                w_mm,
                h_mm,
                width_pt,
                color,
            } => {
                let [r, g, b] = color.unit();
                ops.push(Operation::new("RG", vec![real(r), real(g), real(b)]));
                ops.push(Operation::new("w", vec![real(*width_pt)]));
                ops.push(Operation::new(
                    "re",
                    vec![
                        real(mm_to_pt(*x_mm)),
                        real(height_pt - mm_to_pt(*y_mm + *h_mm)),
                        real(mm_to_pt(*w_mm)),
                        real(mm_to_pt(*h_mm)),
                    ],
                ));
                ops.push(Operation::new("S", vec![]));
            }
        }
    }
    ops
}

/// Renders laid-out pages over the template's first page (or blank A4).
pub fn render(
    pages: &[Vec<Mark>],
    font: &mut ReportFont,
    template: Option<&[u8]>,
) -> Result<Vec<u8>, ReportError> {
    let mut base = match template {
        Some(bytes) => template_base(bytes)?,
        None => blank_base(),
    };

    let mut overlays = Vec::with_capacity(pages.len());
    for marks in pages {
        let content = Content {
            operations: overlay_ops(marks, font, base.height_pt),
        };
        overlays.push(content.encode().map_err(lopdf_err("report_failed"))?);
    }

    let doc = &mut base.doc;
    let font_id = font.add_to(doc);

    let mut fonts = base
        .resources
        .get(b"Font")
        .ok()
        .and_then(|o| resolve_dict(doc, o))
        .unwrap_or_default();
    fonts.set(FONT_RESOURCE, Object::Reference(font_id));
    let mut resources = base.resources.clone();
    resources.set("Font", Object::Dictionary(fonts));

    // The template's own drawing is wrapped in q/Q so its graphics state does
    // not leak into the overlay.
    let wrap = if base.from_template && !base.contents.is_empty() {
        let save = doc.add_object(Stream::new(dictionary! {}, b"q\n".to_vec()));
        let restore = doc.add_object(Stream::new(dictionary! {}, b"Q\n".to_vec()));
        Some((save, restore))
    } else {
        None
    };

    let mut kids = Vec::with_capacity(overlays.len());
    for bytes in overlays {
        let overlay_id = doc.add_object(Stream::new(dictionary! {}, bytes));
        let mut contents = Vec::new();
        if let Some((save, restore)) = wrap {
            contents.push(Object::Reference(save));
            contents.extend(base.contents.iter().cloned());
            contents.push(Object::Reference(restore));
        }
        contents.push(Object::Reference(overlay_id));

        let mut page = base.page.clone();
        page.set("Parent", Object::Reference(base.pages_id));
        page.set("Resources", Object::Dictionary(resources.clone()));
        page.set("Contents", Object::Array(contents));
        kids.push(Object::Reference(doc.add_object(page)));
    }
    let count = kids.len() as i64;

    if base.from_template {
        let pages = doc
            .get_object_mut(base.pages_id)
            .and_then(|o| o.as_dict_mut())
            .map_err(lopdf_err("report_failed"))?;
        pages.set("Kids", Object::Array(kids));
        pages.set("Count", Object::Integer(count));
    } else {
        doc.objects.insert(
            base.pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count,
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => base.pages_id,
        });
        doc.trailer.set("Root", Object::Reference(catalog_id));
    }

    doc.prune_objects();
    doc.compress();
    let mut out = Vec::new();
    doc.save_to(&mut out)
        .map_err(|e| ReportError::new("report_failed", e.to_string()))?;
    Ok(out)
}
