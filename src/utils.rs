use macroquad::prelude::*;

pub fn string_to_color(color_str: &str) -> Color {
    match color_str {
        "PINK" => PINK,
        "RED" => RED,
        "ORANGE" => ORANGE,
        "YELLOW" => YELLOW,
        "GREEN" => GREEN,
        "BLUE" => BLUE,
        "PURPLE" => VIOLET, // USING VIOLET AS A CLOSE APPROXIMATION
        _ => WHITE, // Default to WHITE
    }
}

/// Parses a resolution string like "854x480".
pub fn parse_resolution(resolution_str: &str) -> Option<(i32, i32)> {
    let (w_str, h_str) = resolution_str.split_once('x')?;
    match (w_str.trim().parse::<i32>(), h_str.trim().parse::<i32>()) {
        (Ok(w), Ok(h)) if w > 0 && h > 0 => Some((w, h)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolution_strings() {
        assert_eq!(parse_resolution("854x480"), Some((854, 480)));
        assert_eq!(parse_resolution(" 1280 x 720 "), Some((1280, 720)));
        assert_eq!(parse_resolution("0x480"), None);
        assert_eq!(parse_resolution("fullhd"), None);
    }

    #[test]
    fn unknown_colors_are_white() {
        assert_eq!(string_to_color("GREEN"), GREEN);
        assert_eq!(string_to_color("beige"), WHITE);
    }
}
