//! Drawing of the weather dashboard.

use embedded_graphics::pixelcolor::Rgb888;
use embedded_graphics::prelude::Point;
use embedded_graphics::prelude::Primitive;
use embedded_graphics::primitives::Circle;
use embedded_graphics::primitives::Line;
use embedded_graphics::primitives::PrimitiveStyle;
use embedded_graphics::primitives::PrimitiveStyleBuilder;
use embedded_graphics::primitives::Triangle;
use time::format_description::BorrowedFormatItem;
use time::macros::format_description;

use super::api::describe;
use super::api::WeatherReport;
use crate::canvas::Canvas;
use crate::canvas::FONT_BOLD;
use crate::canvas::FONT_MEDIUM;
use crate::canvas::FONT_SMALL;
use crate::color::BLACK;
use crate::color::BLUE;
use crate::color::RED;
use crate::color::WHITE;
use crate::color::YELLOW;
use crate::config::Units;

const MARGIN: i32 = 20;

const LOCAL_TIME: &[BorrowedFormatItem<'static>] = format_description!("[year]-[month]-[day]T[hour]:[minute]");
const DATE: &[BorrowedFormatItem<'static>] = format_description!("[year]-[month]-[day]");

/// Rough grouping of WMO codes, one per drawn icon.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Icon {
    Clear,
    PartlyCloudy,
    Cloudy,
    Fog,
    Drizzle,
    Rain,
    Snow,
    Thunder,
}

impl Icon {
    pub fn for_code(code: u16) -> Self {
        match code {
            0 | 1 => Icon::Clear,
            2 => Icon::PartlyCloudy,
            3 => Icon::Cloudy,
            45 | 48 => Icon::Fog,
            51..=57 => Icon::Drizzle,
            61..=67 | 80..=82 => Icon::Rain,
            71..=77 | 85 | 86 => Icon::Snow,
            95..=99 => Icon::Thunder,
            _ => Icon::Cloudy,
        }
    }
}

fn temperature_unit(units: Units) -> &'static str {
    match units {
        Units::Metric => "°C",
        Units::Imperial => "°F",
    }
}

fn speed_unit(units: Units) -> &'static str {
    match units {
        Units::Metric => "km/h",
        Units::Imperial => "mph",
    }
}

fn reformat(value: &str, from: &[BorrowedFormatItem<'_>], to: &[BorrowedFormatItem<'_>]) -> Option<String> {
    let parsed = time::PrimitiveDateTime::parse(value, from).ok()?;
    parsed.format(to).ok()
}

fn reformat_date(value: &str, to: &[BorrowedFormatItem<'_>]) -> Option<String> {
    let parsed = time::Date::parse(value, DATE).ok()?;
    parsed.format(to).ok()
}

pub fn render(report: &WeatherReport, location: &str, units: Units, width: u32, height: u32) -> Canvas {
    let mut canvas = Canvas::new(width, height, WHITE);
    let w = width as i32;
    let degrees = temperature_unit(units);

    // Header
    canvas.text(location, Point::new(MARGIN, 12), &FONT_MEDIUM, BLACK);
    let long_date = reformat(
        &report.current.time,
        LOCAL_TIME,
        format_description!("[weekday], [day padding:none] [month repr:long] [year]"),
    )
    .unwrap_or_default();
    let date_x = w - MARGIN - long_date.chars().count() as i32 * 10;
    canvas.text(&long_date, Point::new(date_x, 12), &FONT_MEDIUM, BLACK);
    separator(&mut canvas, 42);

    // Current conditions
    let current = &report.current;
    draw_icon(&mut canvas, Icon::for_code(current.weather_code), Point::new(110, 130), 100);
    canvas.text_scaled(
        &format!("{}{degrees}", current.temperature),
        Point::new(300, 110),
        &FONT_MEDIUM,
        3,
        BLACK,
        WHITE,
    );
    canvas.text_centered_at(describe(current.weather_code), Point::new(300, 175), &FONT_MEDIUM, BLUE);

    let today = report.daily.first();
    let time_of = |value: Option<&String>| {
        value
            .and_then(|v| reformat(v, LOCAL_TIME, format_description!("[hour]:[minute]")))
            .unwrap_or_else(|| "--:--".to_string())
    };
    let details = [
        format!("Feels like  {}{degrees}", current.feels_like),
        format!("Humidity    {}%", current.humidity),
        format!("Wind        {} {}", current.wind_speed, speed_unit(units)),
        format!("UV index    {}", current.uv_index),
        format!("Sunrise     {}", time_of(today.map(|d| &d.sunrise))),
        format!("Sunset      {}", time_of(today.map(|d| &d.sunset))),
    ];
    let mut y = 60;
    for line in &details {
        canvas.text(line, Point::new(w / 2 + 100, y), &FONT_MEDIUM, BLACK);
        y += 26;
    }
    separator(&mut canvas, 222);

    // Five day strip
    if !report.daily.is_empty() {
        let column = w / report.daily.len() as i32;
        for (i, day) in report.daily.iter().enumerate() {
            let x = column * i as i32 + column / 2;
            let name = reformat_date(&day.date, format_description!("[weekday repr:short]"))
                .unwrap_or_else(|| "???".to_string());
            canvas.text_centered_at(&name, Point::new(x, 240), &FONT_BOLD, BLACK);
            draw_icon(&mut canvas, Icon::for_code(day.weather_code), Point::new(x, 280), 44);
            canvas.text_centered_at(
                &format!("{}° / {}°", day.temp_max, day.temp_min),
                Point::new(x, 322),
                &FONT_MEDIUM,
                BLACK,
            );
        }
    }
    separator(&mut canvas, 342);

    // Hourly strip
    if !report.hourly.is_empty() {
        let column = w / report.hourly.len() as i32;
        for (i, hour) in report.hourly.iter().enumerate() {
            let x = column * i as i32 + column / 2;
            let label = reformat(&hour.time, LOCAL_TIME, format_description!("[hour]"))
                .unwrap_or_else(|| "??".to_string());
            canvas.text_centered_at(&label, Point::new(x, 358), &FONT_SMALL, BLACK);
            draw_icon(&mut canvas, Icon::for_code(hour.weather_code), Point::new(x, 392), 32);
            canvas.text_centered_at(
                &format!("{}°", hour.temperature),
                Point::new(x, 428),
                &FONT_MEDIUM,
                BLACK,
            );
        }
    }

    let updated = report
        .fetched_at
        .to_offset(
            time::UtcOffset::from_whole_seconds(report.utc_offset_seconds)
                .unwrap_or(time::UtcOffset::UTC),
        )
        .format(format_description!("Updated [hour]:[minute]"))
        .unwrap_or_default();
    canvas.text(
        &updated,
        Point::new(w - MARGIN - updated.len() as i32 * 6, height as i32 - 20),
        &FONT_SMALL,
        BLACK,
    );

    canvas
}

fn separator(canvas: &mut Canvas, y: i32) {
    let width = canvas.width() as i32;
    crate::canvas::draw(
        &Line::new(Point::new(MARGIN, y), Point::new(width - MARGIN, y))
            .into_styled(PrimitiveStyle::with_stroke(BLACK, 1)),
        canvas,
    );
}

fn filled(color: Rgb888) -> PrimitiveStyle<Rgb888> {
    PrimitiveStyle::with_fill(color)
}

fn sun(canvas: &mut Canvas, center: Point, size: u32) {
    let s = size as i32;
    let ray_style = PrimitiveStyle::with_stroke(RED, (size / 16).max(1));
    for (dx, dy) in [(1, 0), (-1, 0), (0, 1), (0, -1), (1, 1), (1, -1), (-1, 1), (-1, -1)] {
        let (inner, outer) = if dx != 0 && dy != 0 {
            (s * 5 / 16, s * 7 / 16)
        } else {
            (s * 3 / 8, s / 2)
        };
        let from = center + Point::new(dx * inner, dy * inner);
        let to = center + Point::new(dx * outer, dy * outer);
        crate::canvas::draw(&Line::new(from, to).into_styled(ray_style), canvas);
    }

    let disc = PrimitiveStyleBuilder::new()
        .fill_color(YELLOW)
        .stroke_color(BLACK)
        .stroke_width(1)
        .build();
    crate::canvas::draw(&Circle::with_center(center, size / 2).into_styled(disc), canvas);
}

fn cloud(canvas: &mut Canvas, center: Point, size: u32) {
    let s = size as i32;
    let puffs = [
        (Point::new(-s / 4, s / 10), size * 2 / 5),
        (Point::new(0, -s / 10), size / 2),
        (Point::new(s / 4, s / 10), size * 2 / 5),
    ];

    // Outline first, then the fill on top so overlapping puffs merge.
    for (offset, diameter) in puffs {
        crate::canvas::draw(
            &Circle::with_center(center + offset, diameter + 4).into_styled(filled(BLACK)),
            canvas,
        );
    }
    for (offset, diameter) in puffs {
        crate::canvas::draw(
            &Circle::with_center(center + offset, diameter).into_styled(filled(WHITE)),
            canvas,
        );
    }
}

fn drops(canvas: &mut Canvas, center: Point, size: u32, count: i32) {
    let s = size as i32;
    let style = PrimitiveStyle::with_stroke(BLUE, (size / 20).max(1));
    let spacing = s / (count + 1);
    for i in 1..=count {
        let x = center.x - s / 2 + spacing * i;
        let top = Point::new(x, center.y + s / 5);
        let bottom = Point::new(x - s / 12, center.y + s * 2 / 5);
        crate::canvas::draw(&Line::new(top, bottom).into_styled(style), canvas);
    }
}

pub fn draw_icon(canvas: &mut Canvas, icon: Icon, center: Point, size: u32) {
    let s = size as i32;
    match icon {
        Icon::Clear => sun(canvas, center, size),
        Icon::PartlyCloudy => {
            sun(canvas, center + Point::new(-s / 6, -s / 6), size * 3 / 4);
            cloud(canvas, center + Point::new(s / 10, s / 10), size * 3 / 4);
        }
        Icon::Cloudy => cloud(canvas, center, size),
        Icon::Fog => {
            let style = PrimitiveStyle::with_stroke(BLACK, (size / 16).max(1));
            for dy in [-s / 4, 0, s / 4] {
                let from = center + Point::new(-s * 2 / 5, dy);
                let to = center + Point::new(s * 2 / 5, dy);
                crate::canvas::draw(&Line::new(from, to).into_styled(style), canvas);
            }
        }
        Icon::Drizzle => {
            cloud(canvas, center - Point::new(0, s / 8), size);
            drops(canvas, center, size, 2);
        }
        Icon::Rain => {
            cloud(canvas, center - Point::new(0, s / 8), size);
            drops(canvas, center, size, 4);
        }
        Icon::Snow => {
            cloud(canvas, center - Point::new(0, s / 8), size);
            let flake = (size / 10).max(2);
            for dx in [-s / 4, 0, s / 4] {
                let at = center + Point::new(dx, s * 3 / 10);
                crate::canvas::draw(&Circle::with_center(at, flake).into_styled(filled(BLUE)), canvas);
            }
        }
        Icon::Thunder => {
            cloud(canvas, center - Point::new(0, s / 8), size);
            let bolt = PrimitiveStyleBuilder::new()
                .fill_color(YELLOW)
                .stroke_color(BLACK)
                .stroke_width(1)
                .build();
            let top = center + Point::new(s / 10, s / 8);
            let triangle = Triangle::new(
                top,
                top + Point::new(-s / 5, s / 4),
                top + Point::new(0, s / 4),
            );
            crate::canvas::draw(&triangle.into_styled(bolt), canvas);
            let lower = Triangle::new(
                top + Point::new(-s / 20, s / 4),
                top + Point::new(s / 20, s / 4),
                top + Point::new(-s / 10, s * 2 / 5),
            );
            crate::canvas::draw(&lower.into_styled(bolt), canvas);
        }
    }
}

#[cfg(test)]
mod tests {
    use image::Rgb;

    use super::*;
    use crate::modes::weather::api::process;
    use crate::modes::weather::api::testing::FORECAST;

    #[test]
    fn test_icon_groups() {
        assert_eq!(Icon::for_code(0), Icon::Clear);
        assert_eq!(Icon::for_code(2), Icon::PartlyCloudy);
        assert_eq!(Icon::for_code(48), Icon::Fog);
        assert_eq!(Icon::for_code(55), Icon::Drizzle);
        assert_eq!(Icon::for_code(81), Icon::Rain);
        assert_eq!(Icon::for_code(86), Icon::Snow);
        assert_eq!(Icon::for_code(96), Icon::Thunder);
        assert_eq!(Icon::for_code(1000), Icon::Cloudy);
    }

    #[test]
    fn test_reformat() {
        assert_eq!(
            reformat("2025-10-15T07:21", LOCAL_TIME, format_description!("[hour]:[minute]")),
            Some("07:21".to_string())
        );
        assert_eq!(
            reformat_date("2025-10-15", format_description!("[weekday repr:short]")),
            Some("Wed".to_string())
        );
        assert_eq!(reformat("garbage", LOCAL_TIME, LOCAL_TIME), None);
    }

    #[test]
    fn test_every_icon_draws_inside_its_box() {
        let icons = [
            Icon::Clear,
            Icon::PartlyCloudy,
            Icon::Cloudy,
            Icon::Fog,
            Icon::Drizzle,
            Icon::Rain,
            Icon::Snow,
            Icon::Thunder,
        ];
        for icon in icons {
            let mut canvas = Canvas::new(120, 120, WHITE);
            draw_icon(&mut canvas, icon, Point::new(60, 60), 100);
            assert!(
                canvas.image().pixels().any(|p| p != &Rgb([255, 255, 255])),
                "{icon:?} drew nothing"
            );
        }
    }

    #[test]
    fn test_render_dashboard() {
        let fetched_at = time::OffsetDateTime::from_unix_timestamp(1_760_519_700).unwrap();
        let report = process(serde_json::from_str(FORECAST).unwrap(), fetched_at);
        let canvas = render(&report, "51.51°N, 0.13°W", Units::Metric, 800, 480);

        assert_eq!(canvas.image().dimensions(), (800, 480));
        assert!(canvas.image().pixels().any(|p| p == &Rgb([0, 0, 255])));
        assert!(canvas.image().pixels().any(|p| p == &Rgb([0, 0, 0])));
    }
}
