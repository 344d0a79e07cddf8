//! Dark map theme for the native viewer

use egui::Color32;

/// Night-map palette
pub mod colors {
    use super::Color32;

    // === Backgrounds ===
    pub const BG_PRIMARY: Color32 = Color32::from_rgb(8, 10, 14);     // #080A0E - map background
    pub const BG_ELEVATED: Color32 = Color32::from_rgb(18, 21, 28);   // #12151C - panels
    pub const BG_HOVER: Color32 = Color32::from_rgb(30, 34, 44);      // #1E222C - hover states

    // === Text ===
    pub const TEXT_PRIMARY: Color32 = Color32::from_rgb(235, 235, 235);
    pub const TEXT_SECONDARY: Color32 = Color32::from_rgb(160, 160, 160);
    pub const TEXT_MUTED: Color32 = Color32::from_rgb(80, 80, 80);

    pub const BORDER: Color32 = Color32::from_rgb(40, 44, 52);

    // === Map features ===
    pub const ROAD: Color32 = Color32::from_rgb(58, 62, 72);
    pub const BUILDING: Color32 = Color32::from_rgb(90, 96, 110);
    pub const GREEN_BUILDING: Color32 = Color32::from_rgb(50, 205, 50);
    pub const SUBSTATION: Color32 = Color32::from_rgb(255, 69, 0);

    /// Fallback when a particle color can't be parsed
    pub const PARTICLE: Color32 = Color32::WHITE;
}

/// Create dark egui Visuals for the viewer
pub fn map_visuals() -> egui::Visuals {
    use colors::*;

    let mut visuals = egui::Visuals::dark();

    visuals.panel_fill = BG_ELEVATED;
    visuals.window_fill = BG_ELEVATED;
    visuals.extreme_bg_color = BG_PRIMARY;
    visuals.faint_bg_color = BG_ELEVATED;

    visuals.override_text_color = Some(TEXT_PRIMARY);

    visuals.widgets.noninteractive.bg_fill = BG_ELEVATED;
    visuals.widgets.noninteractive.fg_stroke = egui::Stroke::new(1.0, TEXT_MUTED);
    visuals.widgets.noninteractive.bg_stroke = egui::Stroke::new(1.0, BORDER);

    visuals.widgets.inactive.bg_fill = BG_ELEVATED;
    visuals.widgets.inactive.fg_stroke = egui::Stroke::new(1.0, TEXT_SECONDARY);
    visuals.widgets.inactive.bg_stroke = egui::Stroke::new(1.0, BORDER);
    visuals.widgets.inactive.weak_bg_fill = BG_ELEVATED;

    visuals.widgets.hovered.bg_fill = BG_HOVER;
    visuals.widgets.hovered.fg_stroke = egui::Stroke::new(1.0, TEXT_PRIMARY);
    visuals.widgets.hovered.bg_stroke = egui::Stroke::new(1.0, TEXT_MUTED);
    visuals.widgets.hovered.weak_bg_fill = BG_HOVER;

    visuals.selection.bg_fill = Color32::from_rgb(40, 60, 90);
    visuals.selection.stroke = egui::Stroke::new(1.0, TEXT_PRIMARY);

    visuals.window_shadow = egui::Shadow::NONE;
    visuals.popup_shadow = egui::Shadow::NONE;

    visuals
}

/// Parse the CSS colors particles carry (`#RRGGBB`, `rgb()`, `rgba()`),
/// multiplying alpha by `opacity`.
pub fn css_color(css: &str, opacity: f64) -> Option<Color32> {
    let css = css.trim();
    let (r, g, b, a) = if let Some(hex) = css.strip_prefix('#') {
        if hex.len() != 6 {
            return None;
        }
        let channel = |i: usize| u8::from_str_radix(hex.get(i..i + 2)?, 16).ok();
        (channel(0)?, channel(2)?, channel(4)?, 1.0)
    } else {
        let inner = css
            .strip_prefix("rgba(")
            .or_else(|| css.strip_prefix("rgb("))?
            .strip_suffix(')')?;
        let parts: Vec<&str> = inner.split(',').map(str::trim).collect();
        let channel = |i: usize| parts.get(i)?.parse::<u8>().ok();
        let alpha = match parts.get(3) {
            Some(a) => a.parse::<f64>().ok()?,
            None => 1.0,
        };
        (channel(0)?, channel(1)?, channel(2)?, alpha)
    };
    let alpha = (a * opacity).clamp(0.0, 1.0);
    Some(Color32::from_rgba_unmultiplied(r, g, b, (alpha * 255.0).round() as u8))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_css_color_hex() {
        assert_eq!(css_color("#FFD700", 1.0), Some(Color32::from_rgb(255, 215, 0)));
        assert_eq!(css_color("#FFD70", 1.0), None);
    }

    #[test]
    fn test_css_color_rgba_with_opacity() {
        let c = css_color("rgba(135, 206, 250, 1)", 0.5).unwrap();
        assert_eq!(c, Color32::from_rgba_unmultiplied(135, 206, 250, 128));
        let c = css_color("rgba(135, 206, 250, 0.6)", 1.0).unwrap();
        assert_eq!(c.a(), 153);
        assert_eq!(css_color("rgb(1, 2, 3)", 1.0), Some(Color32::from_rgb(1, 2, 3)));
        assert_eq!(css_color("hsl(0, 0%, 0%)", 1.0), None);
    }
}
