use eframe::egui::{Color32, Painter, Pos2, Rect, Stroke, Vec2};

const DOMAIN_COLORS: [(&str, Color32); 4] = [
    ("Volt-related", Color32::from_rgb(0xf5, 0x9e, 0x0b)),
    ("Temp-related", Color32::from_rgb(0x10, 0xb9, 0x81)),
    ("Pressure-related", Color32::from_rgb(0xef, 0x44, 0x44)),
    ("Cross-domain", Color32::from_rgb(0x3b, 0x82, 0xf6)),
];

const EXTENDED_PALETTE: [Color32; 10] = [
    Color32::from_rgb(0x8b, 0x5c, 0xf6),
    Color32::from_rgb(0xec, 0x48, 0x99),
    Color32::from_rgb(0x14, 0xb8, 0xa6),
    Color32::from_rgb(0xf9, 0x73, 0x16),
    Color32::from_rgb(0x06, 0xb6, 0xd4),
    Color32::from_rgb(0x84, 0xcc, 0x16),
    Color32::from_rgb(0xa8, 0x55, 0xf7),
    Color32::from_rgb(0xef, 0x44, 0x44),
    Color32::from_rgb(0x22, 0xc5, 0x5e),
    Color32::from_rgb(0x63, 0x66, 0xf1),
];

pub(super) const TEMPLATE_FILL: Color32 = Color32::from_rgb(0xf3, 0xf4, 0xf6);
pub(super) const TEMPLATE_TEXT: Color32 = Color32::from_rgb(0x37, 0x41, 0x51);
pub(super) const NODE_TEXT: Color32 = Color32::WHITE;
pub(super) const NODE_OUTLINE: Color32 = Color32::from_rgb(0x94, 0xa3, 0xb8);
pub(super) const EDGE_COLOR: Color32 = Color32::from_rgb(0xcb, 0xd5, 0xe1);

/// Polynomial rolling hash over UTF-16 code units with 32-bit wraparound.
// Every step wraps to i32, not only the multiply, so colors for long domain
// names match other clients that hash the same way.
fn domain_hash(domain: &str) -> i32 {
    domain
        .encode_utf16()
        .fold(0_i32, |hash, unit| hash.wrapping_mul(31).wrapping_add(i32::from(unit)))
}

/// Stable display color for a domain: the fixed table first, then a
/// hash-selected palette entry.
pub(super) fn domain_color(domain: &str) -> Color32 {
    if let Some((_, color)) = DOMAIN_COLORS.iter().find(|(name, _)| *name == domain) {
        return *color;
    }

    let index = domain_hash(domain).unsigned_abs() as usize % EXTENDED_PALETTE.len();
    EXTENDED_PALETTE[index]
}

pub(super) fn blend_color(base: Color32, overlay: Color32, amount: f32) -> Color32 {
    let amount = amount.clamp(0.0, 1.0);
    let inverse = 1.0 - amount;

    Color32::from_rgba_unmultiplied(
        ((base.r() as f32 * inverse) + (overlay.r() as f32 * amount)) as u8,
        ((base.g() as f32 * inverse) + (overlay.g() as f32 * amount)) as u8,
        ((base.b() as f32 * inverse) + (overlay.b() as f32 * amount)) as u8,
        ((base.a() as f32 * inverse) + (overlay.a() as f32 * amount)) as u8,
    )
}

pub(super) fn draw_background(painter: &Painter, rect: Rect, pan: Vec2, zoom: f32) {
    painter.rect_filled(rect, 0.0, Color32::from_rgb(0xf1, 0xf5, 0xf9));

    let step = (56.0 * zoom.clamp(0.6, 1.8)).max(20.0);
    let origin = rect.left_top() + pan;
    let stroke = Stroke::new(1.0, Color32::from_rgba_unmultiplied(148, 163, 184, 40));

    let mut x = rect.left() + (origin.x - rect.left()).rem_euclid(step);
    while x < rect.right() {
        painter.line_segment([Pos2::new(x, rect.top()), Pos2::new(x, rect.bottom())], stroke);
        x += step;
    }

    let mut y = rect.top() + (origin.y - rect.top()).rem_euclid(step);
    while y < rect.bottom() {
        painter.line_segment([Pos2::new(rect.left(), y), Pos2::new(rect.right(), y)], stroke);
        y += step;
    }
}

/// Layout space is anchored at the canvas' top-left corner.
pub(super) fn world_to_screen(rect: Rect, pan: Vec2, zoom: f32, world: Pos2) -> Pos2 {
    rect.left_top() + pan + world.to_vec2() * zoom
}

pub(super) fn screen_to_world(rect: Rect, pan: Vec2, zoom: f32, screen: Pos2) -> Pos2 {
    ((screen - rect.left_top() - pan) / zoom).to_pos2()
}

#[cfg(test)]
mod tests {
    use eframe::egui::pos2;

    use super::*;

    #[test]
    fn known_domains_use_the_fixed_table() {
        assert_eq!(domain_color("Volt-related"), Color32::from_rgb(0xf5, 0x9e, 0x0b));
        assert_eq!(domain_color("Volt-related"), domain_color("Volt-related"));
        assert_eq!(domain_color("Cross-domain"), Color32::from_rgb(0x3b, 0x82, 0xf6));
    }

    #[test]
    fn unknown_domains_hash_into_the_palette() {
        assert_eq!(domain_hash("ab"), 3105);
        assert_eq!(domain_hash(""), 0);

        assert_eq!(domain_color("UnknownDomainXYZ"), EXTENDED_PALETTE[5]);
        assert_eq!(domain_color("UnknownDomainXYZ"), domain_color("UnknownDomainXYZ"));
        assert_eq!(domain_color("Current-related"), EXTENDED_PALETTE[1]);
        assert_eq!(domain_color("Humidity"), EXTENDED_PALETTE[9]);
        assert_eq!(domain_color(""), EXTENDED_PALETTE[0]);
    }

    #[test]
    fn hash_wraps_like_32_bit_integers() {
        assert_eq!(domain_hash("UnknownDomainXYZ"), -2_014_116_565);
        assert_eq!(domain_hash("Humidity-related"), -572_482_255);
        assert_eq!(domain_color("Humidity-related"), EXTENDED_PALETTE[5]);
    }

    #[test]
    fn screen_mapping_round_trips() {
        let rect = Rect::from_min_size(pos2(10.0, 20.0), Vec2::new(300.0, 200.0));
        let pan = Vec2::new(-15.0, 7.5);
        let world = pos2(120.0, 64.0);
        let screen = world_to_screen(rect, pan, 1.5, world);
        let back = screen_to_world(rect, pan, 1.5, screen);
        assert!((back - world).length() < 1e-3);
    }
}
