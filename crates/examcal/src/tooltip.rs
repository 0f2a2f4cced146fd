//! Viewport-aware placement of the per-day exam tooltip.
//!
//! Placement is pure geometry: the caller measures the clicked cell, the
//! tooltip and the window, and gets back page-absolute coordinates. The page
//! re-requests a placement on every resize and scroll.

use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Used when the tooltip has not been measured yet
pub const DEFAULT_TOOLTIP_WIDTH: f64 = 300.0;
pub const DEFAULT_TOOLTIP_HEIGHT: f64 = 200.0;

/// Gap between target and tooltip, and margin kept from viewport edges
pub const MIN_OFFSET: f64 = 10.0;

/// Calendar cells sit in a grid wider than tall, so sideways placement wins
const HORIZONTAL_BIAS: f64 = 1.2;

const ARROW_MIN_PERCENT: f64 = 5.0;
const ARROW_MAX_PERCENT: f64 = 95.0;

/// Viewport-relative bounding box, as returned by `getBoundingClientRect`
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub top: f64,
    pub left: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(top: f64, left: f64, width: f64, height: f64) -> Self {
        Self {
            top,
            left,
            width,
            height,
        }
    }

    pub fn right(&self) -> f64 {
        self.left + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.top + self.height
    }

    pub fn center_x(&self) -> f64 {
        self.left + self.width / 2.0
    }

    pub fn center_y(&self) -> f64 {
        self.top + self.height / 2.0
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

impl Size {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    /// Replace unmeasured dimensions (zero, negative, non-finite) with the defaults.
    pub fn measured_or_default(self) -> Self {
        let pick = |value: f64, default: f64| {
            if value.is_finite() && value > 0.0 {
                value
            } else {
                default
            }
        };
        Self {
            width: pick(self.width, DEFAULT_TOOLTIP_WIDTH),
            height: pick(self.height, DEFAULT_TOOLTIP_HEIGHT),
        }
    }
}

/// Page scroll offset
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Offset {
    pub x: f64,
    pub y: f64,
}

impl Offset {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Parse `N` comma-separated numbers, as given on the command line
fn parse_numbers<const N: usize>(s: &str, what: &str) -> Result<[f64; N], String> {
    let parts: Vec<&str> = s.split(',').map(str::trim).collect();
    if parts.len() != N {
        return Err(format!("expected {} as {} comma-separated numbers, got '{}'", what, N, s));
    }
    let mut out = [0.0; N];
    for (slot, part) in out.iter_mut().zip(&parts) {
        *slot = part
            .parse()
            .map_err(|_| format!("invalid number '{}' in {}", part, what))?;
    }
    Ok(out)
}

impl FromStr for Rect {
    type Err = String;

    /// `top,left,width,height`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let [top, left, width, height] = parse_numbers(s, "top,left,width,height")?;
        Ok(Rect::new(top, left, width, height))
    }
}

impl FromStr for Size {
    type Err = String;

    /// `width,height`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let [width, height] = parse_numbers(s, "width,height")?;
        Ok(Size::new(width, height))
    }
}

impl FromStr for Offset {
    type Err = String;

    /// `x,y`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let [x, y] = parse_numbers(s, "x,y")?;
        Ok(Offset::new(x, y))
    }
}

/// Side of the target the tooltip is attached to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Placement {
    Top,
    Right,
    Bottom,
    Left,
}

impl Placement {
    /// Preference order on equal scores. Earlier wins ties.
    const PRIORITY: [Placement; 4] = [
        Placement::Right,
        Placement::Bottom,
        Placement::Left,
        Placement::Top,
    ];

    fn is_horizontal(self) -> bool {
        matches!(self, Placement::Left | Placement::Right)
    }

    fn transform_origin(self) -> &'static str {
        match self {
            Placement::Top => "bottom center",
            Placement::Right => "left center",
            Placement::Bottom => "top center",
            Placement::Left => "right center",
        }
    }

    fn arrow_rotation_deg(self) -> i32 {
        if self.is_horizontal() {
            -45
        } else {
            45
        }
    }
}

impl fmt::Display for Placement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Placement::Top => "top",
            Placement::Right => "right",
            Placement::Bottom => "bottom",
            Placement::Left => "left",
        };
        f.write_str(name)
    }
}

/// Arrow anchor along one tooltip axis, emitted as a CSS length
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ArrowOffset {
    /// `0`
    Start,
    /// `100%`
    End,
    Percent(f64),
}

impl fmt::Display for ArrowOffset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArrowOffset::Start => f.write_str("0"),
            ArrowOffset::End => f.write_str("100%"),
            ArrowOffset::Percent(p) => write!(f, "{}%", p),
        }
    }
}

impl Serialize for ArrowOffset {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Where to draw the tooltip, in page-absolute pixels
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TooltipPosition {
    pub top: f64,
    pub left: f64,
    pub placement: Placement,
    pub arrow_left: ArrowOffset,
    pub arrow_top: ArrowOffset,
    pub arrow_rotation_deg: i32,
    pub transform_origin: &'static str,
}

impl TooltipPosition {
    /// Inline style for the tooltip panel
    pub fn css(&self) -> String {
        format!(
            "top: {}px; left: {}px; transform-origin: {};",
            self.top, self.left, self.transform_origin
        )
    }

    /// Inline style for the arrow diamond
    pub fn arrow_css(&self) -> String {
        format!(
            "left: {}; top: {}; transform: rotate({}deg);",
            self.arrow_left, self.arrow_top, self.arrow_rotation_deg
        )
    }
}

/// What the placer needs to know about the window.
pub trait Viewport {
    fn size(&self) -> Size;
    fn scroll(&self) -> Offset;
}

/// A placement query as posted by the page
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PlacementRequest {
    pub target: Rect,
    #[serde(default)]
    pub tooltip: Option<Size>,
    pub viewport: Size,
    #[serde(default)]
    pub scroll: Offset,
}

impl PlacementRequest {
    pub fn place(&self) -> TooltipPosition {
        place_in(self.target, self.tooltip.unwrap_or_default(), self)
    }
}

impl Viewport for PlacementRequest {
    fn size(&self) -> Size {
        self.viewport
    }

    fn scroll(&self) -> Offset {
        self.scroll
    }
}

pub fn place_in(target: Rect, tooltip: Size, viewport: &impl Viewport) -> TooltipPosition {
    place(target, tooltip, viewport.size(), viewport.scroll())
}

/// Compute where to draw a tooltip of size `tooltip` next to `target`.
///
/// The side is chosen by available space (sideways preferred), then the box
/// is clamped into the viewport without changing the side. Never fails:
/// impossible layouts get a best-effort clamped position.
pub fn place(target: Rect, tooltip: Size, viewport: Size, scroll: Offset) -> TooltipPosition {
    let tooltip = tooltip.measured_or_default();
    let space = Space::around(target, viewport);
    let placement = choose_placement(&space, tooltip);

    let (top, left) = match placement {
        Placement::Top => (
            target.top + scroll.y - tooltip.height - MIN_OFFSET,
            target.center_x() + scroll.x - tooltip.width / 2.0,
        ),
        Placement::Right => (
            target.center_y() + scroll.y - tooltip.height / 2.0,
            target.right() + scroll.x + MIN_OFFSET,
        ),
        Placement::Bottom => (
            target.bottom() + scroll.y + MIN_OFFSET,
            target.center_x() + scroll.x - tooltip.width / 2.0,
        ),
        Placement::Left => (
            target.center_y() + scroll.y - tooltip.height / 2.0,
            target.left + scroll.x - tooltip.width - MIN_OFFSET,
        ),
    };

    let left = clamp_axis(left, scroll.x, tooltip.width, viewport.width);
    let top = clamp_axis(top, scroll.y, tooltip.height, viewport.height);

    let (arrow_left, arrow_top) = match placement {
        Placement::Top | Placement::Bottom => {
            let along = target.center_x() + scroll.x - left;
            let edge = if placement == Placement::Top {
                ArrowOffset::End
            } else {
                ArrowOffset::Start
            };
            (arrow_percent(along, tooltip.width), edge)
        }
        Placement::Left | Placement::Right => {
            let along = target.center_y() + scroll.y - top;
            let edge = if placement == Placement::Left {
                ArrowOffset::End
            } else {
                ArrowOffset::Start
            };
            (edge, arrow_percent(along, tooltip.height))
        }
    };

    TooltipPosition {
        top,
        left,
        placement,
        arrow_left,
        arrow_top,
        arrow_rotation_deg: placement.arrow_rotation_deg(),
        transform_origin: placement.transform_origin(),
    }
}

/// Free space between the target and each viewport edge
#[derive(Debug, Clone, Copy)]
struct Space {
    top: f64,
    right: f64,
    bottom: f64,
    left: f64,
}

impl Space {
    fn around(target: Rect, viewport: Size) -> Self {
        Self {
            top: target.top,
            right: viewport.width - target.right(),
            bottom: viewport.height - target.bottom(),
            left: target.left,
        }
    }

    fn on(&self, placement: Placement) -> f64 {
        match placement {
            Placement::Top => self.top,
            Placement::Right => self.right,
            Placement::Bottom => self.bottom,
            Placement::Left => self.left,
        }
    }
}

fn choose_placement(space: &Space, tooltip: Size) -> Placement {
    let score = |placement: Placement| {
        let needed = if placement.is_horizontal() {
            tooltip.width
        } else {
            tooltip.height
        };
        let available = space.on(placement);
        let fit = if available >= needed + MIN_OFFSET {
            available / needed
        } else {
            0.0
        };
        if placement.is_horizontal() {
            fit * HORIZONTAL_BIAS
        } else {
            fit
        }
    };

    let (best, best_score) = best_by(score);
    if best_score > 0.0 {
        return best;
    }

    // Nothing fits: go where there is most room and let clamping cope
    best_by(|placement| space.on(placement)).0
}

/// Highest key in priority order; a later side only wins on a strictly greater key.
fn best_by(key: impl Fn(Placement) -> f64) -> (Placement, f64) {
    let mut best = Placement::PRIORITY[0];
    let mut best_key = key(best);
    for &candidate in &Placement::PRIORITY[1..] {
        let k = key(candidate);
        if k > best_key {
            best = candidate;
            best_key = k;
        }
    }
    (best, best_key)
}

/// Keep `[pos, pos + len]` at least `MIN_OFFSET` inside `[scroll, scroll + extent]`.
/// The leading edge is checked first, so an oversized box sticks to the trailing margin.
fn clamp_axis(pos: f64, scroll: f64, len: f64, extent: f64) -> f64 {
    if pos - scroll < MIN_OFFSET {
        scroll + MIN_OFFSET
    } else if pos - scroll + len > extent - MIN_OFFSET {
        scroll + extent - len - MIN_OFFSET
    } else {
        pos
    }
}

fn arrow_percent(along: f64, len: f64) -> ArrowOffset {
    ArrowOffset::Percent((along / len * 100.0).clamp(ARROW_MIN_PERCENT, ARROW_MAX_PERCENT))
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL_HD: Size = Size {
        width: 1920.0,
        height: 1080.0,
    };
    const TOOLTIP: Size = Size {
        width: 300.0,
        height: 200.0,
    };

    fn no_scroll() -> Offset {
        Offset::default()
    }

    #[test]
    fn test_top_left_corner_goes_right() {
        let target = Rect::new(20.0, 20.0, 50.0, 50.0);
        let pos = place(target, TOOLTIP, FULL_HD, no_scroll());

        assert_eq!(pos.placement, Placement::Right);
        assert_eq!(pos.left, 80.0);
        // Centered on the target would be -55, clamped to the margin
        assert_eq!(pos.top, 10.0);
        assert_eq!(pos.arrow_left, ArrowOffset::Start);
        assert_eq!(pos.arrow_rotation_deg, -45);
        assert_eq!(pos.transform_origin, "left center");
    }

    #[test]
    fn test_near_right_edge_goes_left_and_stays_inside() {
        let target = Rect::new(500.0, 1700.0, 50.0, 50.0);
        let pos = place(target, TOOLTIP, FULL_HD, no_scroll());

        assert_eq!(pos.placement, Placement::Left);
        assert_eq!(pos.left, 1700.0 - 300.0 - 10.0);
        assert!(pos.left + TOOLTIP.width <= FULL_HD.width - MIN_OFFSET);
        assert_eq!(pos.top, 525.0 - 100.0);
        assert_eq!(pos.arrow_left, ArrowOffset::End);
        assert_eq!(pos.arrow_top, ArrowOffset::Percent(50.0));
    }

    #[test]
    fn test_never_picks_side_without_room_when_another_fits() {
        for &(top, left) in &[(5.0, 5.0), (5.0, 1850.0), (1020.0, 5.0), (1020.0, 1850.0)] {
            let target = Rect::new(top, left, 50.0, 50.0);
            let pos = place(target, TOOLTIP, FULL_HD, no_scroll());
            let space = Space::around(target, FULL_HD);
            let needed = match pos.placement {
                Placement::Left | Placement::Right => TOOLTIP.width,
                Placement::Top | Placement::Bottom => TOOLTIP.height,
            };
            assert!(space.on(pos.placement) >= needed + MIN_OFFSET);
        }
    }

    #[test]
    fn test_bottom_placement_clamped_horizontally() {
        let viewport = Size::new(400.0, 1080.0);
        let target = Rect::new(10.0, 350.0, 40.0, 40.0);
        let pos = place(target, TOOLTIP, viewport, no_scroll());

        assert_eq!(pos.placement, Placement::Bottom);
        assert_eq!(pos.top, 60.0);
        assert_eq!(pos.left, 90.0);
        assert!(pos.left + TOOLTIP.width <= viewport.width - MIN_OFFSET);
        assert_eq!(pos.arrow_top, ArrowOffset::Start);
        match pos.arrow_left {
            ArrowOffset::Percent(p) => assert!((p - 93.333).abs() < 0.01),
            other => panic!("unexpected arrow offset {:?}", other),
        }
    }

    #[test]
    fn test_top_placement_arrow_at_bottom_edge() {
        let viewport = Size::new(400.0, 600.0);
        let target = Rect::new(500.0, 180.0, 40.0, 40.0);
        let pos = place(target, TOOLTIP, viewport, no_scroll());

        assert_eq!(pos.placement, Placement::Top);
        assert_eq!(pos.top, 500.0 - 200.0 - 10.0);
        assert_eq!(pos.left, 50.0);
        assert_eq!(pos.arrow_top, ArrowOffset::End);
        assert_eq!(pos.arrow_left, ArrowOffset::Percent(50.0));
        assert_eq!(pos.arrow_rotation_deg, 45);
        assert_eq!(pos.transform_origin, "bottom center");
    }

    #[test]
    fn test_ties_prefer_right_over_left() {
        let viewport = Size::new(1000.0, 1000.0);
        let target = Rect::new(450.0, 450.0, 100.0, 100.0);
        let pos = place(target, Size::new(300.0, 300.0), viewport, no_scroll());
        assert_eq!(pos.placement, Placement::Right);
    }

    #[test]
    fn test_ties_prefer_bottom_over_top() {
        let viewport = Size::new(1000.0, 1000.0);
        let target = Rect::new(450.0, 450.0, 100.0, 100.0);
        let pos = place(target, Size::new(600.0, 200.0), viewport, no_scroll());
        assert_eq!(pos.placement, Placement::Bottom);
    }

    #[test]
    fn test_nothing_fits_uses_largest_space() {
        let viewport = Size::new(300.0, 400.0);
        // right 150, bottom 160, left 100, top 160
        let target = Rect::new(160.0, 100.0, 50.0, 80.0);
        let pos = place(target, TOOLTIP, viewport, no_scroll());
        assert_eq!(pos.placement, Placement::Bottom);
    }

    #[test]
    fn test_nothing_fits_all_equal_defaults_to_right() {
        let viewport = Size::new(200.0, 150.0);
        let target = Rect::new(50.0, 50.0, 100.0, 50.0);
        let pos = place(target, TOOLTIP, viewport, no_scroll());

        assert_eq!(pos.placement, Placement::Right);
        assert_eq!(pos.top, 10.0);
        assert_eq!(pos.left, 200.0 - 300.0 - 10.0);
    }

    #[test]
    fn test_scroll_offsets_make_coordinates_absolute() {
        let target = Rect::new(100.0, 100.0, 50.0, 50.0);
        let scroll = Offset::new(30.0, 500.0);
        let pos = place(target, TOOLTIP, FULL_HD, scroll);

        assert_eq!(pos.placement, Placement::Right);
        assert_eq!(pos.top, 125.0 + 500.0 - 100.0);
        assert_eq!(pos.left, 150.0 + 30.0 + 10.0);
        assert_eq!(pos.arrow_top, ArrowOffset::Percent(50.0));
    }

    #[test]
    fn test_clamp_respects_scrolled_viewport() {
        let target = Rect::new(0.0, 100.0, 50.0, 20.0);
        let pos = place(target, TOOLTIP, FULL_HD, Offset::new(0.0, 800.0));

        assert_eq!(pos.placement, Placement::Right);
        assert_eq!(pos.top, 810.0);
        // Target centre sits 0px into the panel, so the arrow is pinned
        assert_eq!(pos.arrow_top, ArrowOffset::Percent(ARROW_MIN_PERCENT));
    }

    #[test]
    fn test_unmeasured_tooltip_uses_default_size() {
        let target = Rect::new(500.0, 1700.0, 50.0, 50.0);
        let measured = place(target, TOOLTIP, FULL_HD, no_scroll());
        let unmeasured = place(target, Size::default(), FULL_HD, no_scroll());
        assert_eq!(measured, unmeasured);

        let partial = Size::new(f64::NAN, 120.0).measured_or_default();
        assert_eq!(partial, Size::new(300.0, 120.0));
    }

    #[test]
    fn test_zero_viewport_does_not_panic() {
        let pos = place(Rect::default(), TOOLTIP, Size::default(), no_scroll());
        assert!(pos.top.is_finite());
        assert!(pos.left.is_finite());
    }

    #[test]
    fn test_place_is_idempotent() {
        let target = Rect::new(333.0, 777.0, 64.0, 48.0);
        let scroll = Offset::new(0.0, 120.0);
        assert_eq!(
            place(target, TOOLTIP, FULL_HD, scroll),
            place(target, TOOLTIP, FULL_HD, scroll)
        );
    }

    #[test]
    fn test_placement_request_uses_viewport_trait() {
        let json = r#"{
            "target": {"top": 20, "left": 20, "width": 50, "height": 50},
            "viewport": {"width": 1920, "height": 1080}
        }"#;
        let request: PlacementRequest = serde_json::from_str(json).unwrap();

        assert_eq!(request.scroll, Offset::default());
        assert_eq!(
            request.place(),
            place(request.target, TOOLTIP, FULL_HD, no_scroll())
        );
    }

    #[test]
    fn test_geometry_from_command_line() {
        assert_eq!("20,20,50,50".parse::<Rect>().unwrap(), Rect::new(20.0, 20.0, 50.0, 50.0));
        assert_eq!(" 1920 , 1080 ".parse::<Size>().unwrap(), FULL_HD);
        assert_eq!("0,120.5".parse::<Offset>().unwrap(), Offset::new(0.0, 120.5));
        assert!("1,2,3".parse::<Rect>().is_err());
        assert!("a,b".parse::<Size>().is_err());
    }

    #[test]
    fn test_position_serialization_and_css() {
        let pos = place(Rect::new(500.0, 1700.0, 50.0, 50.0), TOOLTIP, FULL_HD, no_scroll());
        let value = serde_json::to_value(&pos).unwrap();

        assert_eq!(value["placement"], "left");
        assert_eq!(value["arrowLeft"], "100%");
        assert_eq!(value["arrowTop"], "50%");
        assert_eq!(value["arrowRotationDeg"], -45);
        assert_eq!(pos.css(), "top: 425px; left: 1390px; transform-origin: right center;");
        assert_eq!(pos.arrow_css(), "left: 100%; top: 50%; transform: rotate(-45deg);");
    }
}
