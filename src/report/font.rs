use super::layout::TextMeasure;
use super::ReportError;
use lopdf::{dictionary, Document, Object, ObjectId, Stream, StringFormat};
use std::collections::BTreeMap;
use std::path::Path;

/// Resource name the overlay uses for its font.
pub const FONT_RESOURCE: &str = "FQz0";

/// Cyrillic-capable face used when no font path is configured.
const BUNDLED_FONT: &[u8] = include_bytes!("../../assets/fonts/DejaVuSans.ttf");
const BUNDLED_FONT_NAME: &str = "DejaVuSans";

/// Variation selectors and joiners have no visible glyph of their own.
fn is_invisible(ch: char) -> bool {
    matches!(ch, '\u{200d}' | '\u{fe00}'..='\u{fe0f}')
}

#[derive(Debug, Clone)]
pub struct ReportFont {
    name: String,
    data: Vec<u8>,
    units_per_em: u16,
    ascender: i16,
    descender: i16,
    cap_height: i16,
    bbox: [i16; 4],
    /// glyph id -> (advance per 1000 em, source char)
    used: BTreeMap<u16, (u16, char)>,
}

impl ReportFont {
    pub fn from_bytes(name: &str, data: Vec<u8>) -> Result<Self, ReportError> {
        let face = ttf_parser::Face::parse(&data, 0)
            .map_err(|e| ReportError::new("font_load_failed", format!("font parse failed: {}", e)))?;
        let units_per_em = face.units_per_em();
        if units_per_em == 0 {
            return Err(ReportError::new("font_load_failed", "font has zero units per em"));
        }
        let bb = face.global_bounding_box();
        let ascender = face.ascender();
        let descender = face.descender();
        let cap_height = face.capital_height().unwrap_or(ascender);
        let name = sanitize_font_name(name);
        Ok(Self {
            name,
            units_per_em,
            ascender,
            descender,
            cap_height,
            bbox: [bb.x_min, bb.y_min, bb.x_max, bb.y_max],
            used: BTreeMap::new(),
            data,
        })
    }

    pub fn load(path: &Path) -> Result<Self, ReportError> {
        let data = std::fs::read(path).map_err(|e| {
            ReportError::new("font_load_failed", format!("{}: {}", path.display(), e))
        })?;
        let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("ReportFont");
        Self::from_bytes(stem, data)
    }

    /// The configured TrueType file, or the bundled face when none is set.
    pub fn load_or_bundled(path: Option<&Path>) -> Result<Self, ReportError> {
        match path {
            Some(p) => Self::load(p),
            None => Self::bundled(),
        }
    }

    pub fn bundled() -> Result<Self, ReportError> {
        Self::from_bytes(BUNDLED_FONT_NAME, BUNDLED_FONT.to_vec())
    }

    /// Operand for `Tj`. Text is recorded so only used glyphs get widths and
    /// ToUnicode entries.
    pub fn encode(&mut self, text: &str) -> Object {
        let glyphs = self.glyphs(text);
        let mut bytes = Vec::with_capacity(glyphs.len() * 2);
        for (gid, width, ch) in glyphs {
            bytes.extend_from_slice(&gid.to_be_bytes());
            self.used.entry(gid).or_insert((width, ch));
        }
        Object::String(bytes, StringFormat::Hexadecimal)
    }

    /// Writes the font objects and returns the id of the font dictionary.
    pub fn add_to(&self, doc: &mut Document) -> ObjectId {
        add_type0(doc, self)
    }

    fn scale(&self, v: i32) -> i64 {
        (v as i64 * 1000) / self.units_per_em as i64
    }

    /// (glyph id, advance per 1000 em) for each drawable char. Chars the font
    /// cannot draw are dropped.
    fn glyphs(&self, text: &str) -> Vec<(u16, u16, char)> {
        let Ok(face) = ttf_parser::Face::parse(&self.data, 0) else {
            return Vec::new();
        };
        text.chars()
            .filter(|ch| !is_invisible(*ch))
            .filter_map(|ch| {
                let gid = face.glyph_index(ch)?;
                let adv = face.glyph_hor_advance(gid).unwrap_or(0);
                let width = self.scale(adv as i32) as u16;
                Some((gid.0, width, ch))
            })
            .collect()
    }
}

fn sanitize_font_name(raw: &str) -> String {
    let cleaned: String = raw.chars().filter(|c| c.is_ascii_alphanumeric() || *c == '-').collect();
    if cleaned.is_empty() {
        "ReportFont".to_string()
    } else {
        cleaned
    }
}

impl TextMeasure for ReportFont {
    fn text_width_pt(&self, text: &str, size_pt: f32) -> f32 {
        let units: u32 = self.glyphs(text).iter().map(|(_, w, _)| *w as u32).sum();
        units as f32 * size_pt / 1000.0
    }
}

fn add_type0(doc: &mut Document, f: &ReportFont) -> ObjectId {
    let file_id = doc.add_object(Stream::new(
        dictionary! { "Length1" => f.data.len() as i64 },
        f.data.clone(),
    ));
    let bbox: Vec<Object> = f
        .bbox
        .iter()
        .map(|v| Object::Integer(f.scale(*v as i32)))
        .collect();
    let descriptor_id = doc.add_object(dictionary! {
        "Type" => "FontDescriptor",
        "FontName" => f.name.as_str(),
        "Flags" => 32,
        "FontBBox" => bbox,
        "ItalicAngle" => 0,
        "Ascent" => f.scale(f.ascender as i32),
        "Descent" => f.scale(f.descender as i32),
        "CapHeight" => f.scale(f.cap_height as i32),
        "StemV" => 80,
        "FontFile2" => file_id,
    });

    let mut widths: Vec<Object> = Vec::with_capacity(f.used.len() * 2);
    for (gid, (w, _)) in &f.used {
        widths.push(Object::Integer(*gid as i64));
        widths.push(Object::Array(vec![Object::Integer(*w as i64)]));
    }
    let cid_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "CIDFontType2",
        "BaseFont" => f.name.as_str(),
        "CIDSystemInfo" => dictionary! {
            "Registry" => Object::string_literal("Adobe"),
            "Ordering" => Object::string_literal("Identity"),
            "Supplement" => 0,
        },
        "FontDescriptor" => descriptor_id,
        "DW" => 1000,
        "W" => widths,
        "CIDToGIDMap" => "Identity",
    });

    let to_unicode_id = doc.add_object(Stream::new(dictionary! {}, to_unicode_cmap(&f.used)));
    doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type0",
        "BaseFont" => f.name.as_str(),
        "Encoding" => "Identity-H",
        "DescendantFonts" => vec![Object::Reference(cid_id)],
        "ToUnicode" => to_unicode_id,
    })
}

fn to_unicode_cmap(used: &BTreeMap<u16, (u16, char)>) -> Vec<u8> {
    let mut out = String::from(
        "/CIDInit /ProcSet findresource begin\n12 dict begin\nbegincmap\n\
         /CIDSystemInfo << /Registry (Adobe) /Ordering (UCS) /Supplement 0 >> def\n\
         /CMapName /Adobe-Identity-UCS def\n/CMapType 2 def\n\
         1 begincodespacerange\n<0000> <FFFF>\nendcodespacerange\n",
    );
    let entries: Vec<(&u16, &(u16, char))> = used.iter().collect();
    // bfchar blocks hold at most 100 entries.
    for chunk in entries.chunks(100) {
        out.push_str(&format!("{} beginbfchar\n", chunk.len()));
        for (gid, (_, ch)) in chunk {
            let mut buf = [0u16; 2];
            let hex: String = ch
                .encode_utf16(&mut buf)
                .iter()
                .map(|u| format!("{:04X}", u))
                .collect();
            out.push_str(&format!("<{:04X}> <{}>\n", gid, hex));
        }
        out.push_str("endbfchar\n");
    }
    out.push_str("endcmap\nCMapName currentdict /CMap defineresource pop\nend\nend\n");
    out.into_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bundled_font_draws_cyrillic() {
        let mut f = ReportFont::bundled().expect("bundled font");
        let Object::String(bytes, _) = f.encode("РЕЗУЛЬТАТЫ ДИАГНОСТИКИ") else {
            panic!("expected string");
        };
        // Two bytes per glyph, space included; no glyph is dropped.
        assert_eq!(bytes.len(), 22 * 2);
        assert!(bytes.chunks(2).all(|g| g != [0u8, 0u8].as_slice()));
        assert!(f.text_width_pt("Итог", 12.0) > 0.0);
        assert!(f.used.values().any(|(_, ch)| *ch == 'Р'));
    }

    #[test]
    fn missing_font_path_is_reported() {
        let e = ReportFont::load_or_bundled(Some(Path::new("/nonexistent/font.ttf")))
            .expect_err("no such file");
        assert_eq!(e.code, "font_load_failed");
    }

    #[test]
    fn cmap_chunks_large_glyph_sets() {
        let used: BTreeMap<u16, (u16, char)> = (1..=150u16)
            .map(|g| (g, (500, char::from_u32(0x410 + g as u32).unwrap_or('?'))))
            .collect();
        let cmap = String::from_utf8(to_unicode_cmap(&used)).expect("utf8");
        assert!(cmap.contains("100 beginbfchar"));
        assert!(cmap.contains("50 beginbfchar"));
        assert!(cmap.contains("<0001> <0411>"));
    }

    #[test]
    fn invalid_font_bytes_are_rejected() {
        let e = ReportFont::from_bytes("broken", vec![0, 1, 2, 3]).expect_err("not a font");
        assert_eq!(e.code, "font_load_failed");
    }
}
