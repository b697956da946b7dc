use consentry_core::CapturedNode;

/// Parsed CSS color. Only the forms that actually occur in computed and
/// inline styles are handled: `#rgb`, `#rrggbb`, `rgb()`, `rgba()`, and a
/// handful of keywords.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: f32,
}

impl Rgba {
    pub const fn opaque(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 1.0 }
    }

    pub fn parse(s: &str) -> Option<Rgba> {
        let s = s.trim().to_ascii_lowercase();
        if let Some(hex) = s.strip_prefix('#') {
            return Self::parse_hex(hex);
        }
        if let Some(body) = s.strip_prefix("rgba(").or_else(|| s.strip_prefix("rgb(")) {
            return Self::parse_rgb_body(body.strip_suffix(')')?);
        }
        match s.as_str() {
            "transparent" => Some(Rgba { r: 0, g: 0, b: 0, a: 0.0 }),
            "white" => Some(Rgba::opaque(255, 255, 255)),
            "black" => Some(Rgba::opaque(0, 0, 0)),
            "red" => Some(Rgba::opaque(255, 0, 0)),
            "green" => Some(Rgba::opaque(0, 128, 0)),
            "blue" => Some(Rgba::opaque(0, 0, 255)),
            "gray" | "grey" => Some(Rgba::opaque(128, 128, 128)),
            "silver" => Some(Rgba::opaque(192, 192, 192)),
            _ => None,
        }
    }

    fn parse_hex(hex: &str) -> Option<Rgba> {
        match hex.len() {
            3 => {
                let mut c = [0u8; 3];
                for (i, ch) in hex.chars().enumerate() {
                    let v = ch.to_digit(16)? as u8;
                    c[i] = v * 16 + v;
                }
                Some(Rgba::opaque(c[0], c[1], c[2]))
            }
            6 => {
                let v = u32::from_str_radix(hex, 16).ok()?;
                Some(Rgba::opaque((v >> 16) as u8, (v >> 8) as u8, v as u8))
            }
            _ => None,
        }
    }

    fn parse_rgb_body(body: &str) -> Option<Rgba> {
        let parts: Vec<&str> = body.split(',').map(str::trim).collect();
        if parts.len() < 3 {
            return None;
        }
        let r = parts[0].parse::<f32>().ok()? as u8;
        let g = parts[1].parse::<f32>().ok()? as u8;
        let b = parts[2].parse::<f32>().ok()? as u8;
        let a = match parts.get(3) {
            Some(p) => p.parse::<f32>().ok()?,
            None => 1.0,
        };
        Some(Rgba { r, g, b, a })
    }

    /// Relative luminance, 0.0 (black) to 1.0 (white).
    pub fn luma(&self) -> f32 {
        (0.2126 * self.r as f32 + 0.7152 * self.g as f32 + 0.0722 * self.b as f32) / 255.0
    }

    /// Low-contrast/muted foreground: low saturation at mid-to-high
    /// lightness, the `#999`-style grey that dark patterns paint reject
    /// buttons with.
    pub fn is_muted(&self) -> bool {
        if self.a < 0.05 {
            return true;
        }
        let max = self.r.max(self.g).max(self.b);
        let min = self.r.min(self.g).min(self.b);
        let spread = (max - min) as u32;
        let luma = self.luma();
        spread < 40 && (0.45..0.9).contains(&luma)
    }

    /// A background that actually reads as "filled": non-transparent and
    /// not plain white.
    pub fn is_filled(&self) -> bool {
        self.a > 0.05 && !(self.r > 245 && self.g > 245 && self.b > 245)
    }
}

/// Rendered facts for one element, from the host capture or derived from
/// inline styles on the static-analysis path.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeMetrics {
    pub display_none: bool,
    pub hidden: bool,
    pub opacity: f32,
    pub width: f32,
    pub height: f32,
    pub font_size: Option<f32>,
    pub color: Option<Rgba>,
    pub background: Option<Rgba>,
    pub padding: Option<String>,
}

/// Default rendered size assumed when no capture data and no inline
/// geometry exist (the static path must not treat everything as
/// zero-sized and therefore invisible).
const ASSUMED_WIDTH: f32 = 300.0;
const ASSUMED_HEIGHT: f32 = 60.0;

impl Default for NodeMetrics {
    fn default() -> Self {
        Self {
            display_none: false,
            hidden: false,
            opacity: 1.0,
            width: ASSUMED_WIDTH,
            height: ASSUMED_HEIGHT,
            font_size: None,
            color: None,
            background: None,
            padding: None,
        }
    }
}

impl NodeMetrics {
    /// Visibility rule: not display:none, not visibility:hidden, non-zero
    /// opacity, non-zero rendered width and height.
    pub fn visible(&self) -> bool {
        !self.display_none
            && !self.hidden
            && self.opacity > 0.0
            && self.width > 0.0
            && self.height > 0.0
    }

    pub fn from_captured(node: &CapturedNode) -> Self {
        Self {
            display_none: node.display == "none",
            hidden: node.visibility == "hidden",
            opacity: node.opacity,
            width: node.width,
            height: node.height,
            font_size: (node.font_size > 0.0).then_some(node.font_size),
            color: Rgba::parse(&node.color),
            background: Rgba::parse(&node.background_color),
            padding: (!node.padding.is_empty()).then(|| node.padding.clone()),
        }
    }

    /// Derives metrics from an inline `style` attribute. Fallback path for
    /// static HTML and for elements the capture omitted.
    pub fn from_inline_style(style: Option<&str>) -> Self {
        let mut m = NodeMetrics::default();
        let Some(style) = style else { return m };
        for decl in style.split(';') {
            let Some((key, value)) = decl.split_once(':') else { continue };
            let key = key.trim().to_ascii_lowercase();
            let value = value.trim();
            match key.as_str() {
                "display" => m.display_none = value.eq_ignore_ascii_case("none"),
                "visibility" => m.hidden = value.eq_ignore_ascii_case("hidden"),
                "opacity" => {
                    if let Ok(v) = value.parse::<f32>() {
                        m.opacity = v;
                    }
                }
                "width" => {
                    if let Some(v) = parse_px(value) {
                        m.width = v;
                    }
                }
                "height" => {
                    if let Some(v) = parse_px(value) {
                        m.height = v;
                    }
                }
                "font-size" => m.font_size = parse_px(value),
                "color" => m.color = Rgba::parse(value),
                "background" | "background-color" => {
                    // `background` shorthand: the color is whichever token parses.
                    m.background = value.split_whitespace().find_map(Rgba::parse);
                }
                "padding" => m.padding = Some(value.to_string()),
                _ => {}
            }
        }
        m
    }

    /// Content-size proxy used when comparing nested dialog candidates.
    pub fn area(&self) -> f32 {
        self.width * self.height
    }
}

fn parse_px(value: &str) -> Option<f32> {
    value.trim().strip_suffix("px").and_then(|v| v.trim().parse::<f32>().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_hex_and_functional_colors() {
        assert_eq!(Rgba::parse("#999"), Some(Rgba::opaque(153, 153, 153)));
        assert_eq!(Rgba::parse("#1a2b3c"), Some(Rgba::opaque(26, 43, 60)));
        assert_eq!(Rgba::parse("rgb(10, 20, 30)"), Some(Rgba::opaque(10, 20, 30)));
        let semi = Rgba::parse("rgba(0, 0, 0, 0.5)").unwrap();
        assert!((semi.a - 0.5).abs() < f32::EPSILON);
        assert_eq!(Rgba::parse("bogus"), None);
    }

    #[test]
    fn grey_is_muted_saturated_green_is_not() {
        assert!(Rgba::parse("#999").unwrap().is_muted());
        assert!(!Rgba::parse("green").unwrap().is_muted());
        assert!(!Rgba::parse("black").unwrap().is_muted());
    }

    #[test]
    fn filled_background_excludes_white_and_transparent() {
        assert!(Rgba::parse("green").unwrap().is_filled());
        assert!(!Rgba::parse("white").unwrap().is_filled());
        assert!(!Rgba::parse("transparent").unwrap().is_filled());
    }

    #[test]
    fn inline_style_visibility() {
        let m = NodeMetrics::from_inline_style(Some("display: none"));
        assert!(!m.visible());
        let m = NodeMetrics::from_inline_style(Some("visibility:hidden"));
        assert!(!m.visible());
        let m = NodeMetrics::from_inline_style(Some("opacity:0"));
        assert!(!m.visible());
        let m = NodeMetrics::from_inline_style(Some("width:0px;height:0px"));
        assert!(!m.visible());
        let m = NodeMetrics::from_inline_style(Some("color:#333"));
        assert!(m.visible());
    }

    #[test]
    fn inline_style_fonts_and_colors() {
        let m = NodeMetrics::from_inline_style(Some("font-size:20px;background:green"));
        assert_eq!(m.font_size, Some(20.0));
        assert!(m.background.unwrap().is_filled());
    }
}
