use crate::models::{ResolvedPoint, RouteStep};

/// Presentation strings for the rendered document.
#[derive(Debug, Clone, Copy)]
pub struct Labels {
    pub title: &'static str,
    pub total: &'static str,
    pub by_locality: &'static str,
    pub between_localities: &'static str,
    pub unnamed_street: &'static str,
    pub coordinates: &'static str,
    pub via: &'static str,
    pub key_points: &'static str,
    pub step: &'static str,
    pub street_undetermined: &'static str,
    pub empty_route: &'static str,
    pub meters: &'static str,
    pub kilometers: &'static str,
    pub decimal_separator: char,
    pub hours: &'static str,
    pub minutes: &'static str,
    pub seconds: &'static str,
}

pub const RUSSIAN: Labels = Labels {
    title: "Маршрут A → B",
    total: "Итого",
    by_locality: "По населённым пунктам",
    between_localities: "Между населёнными пунктами",
    unnamed_street: "без названия",
    coordinates: "координаты",
    via: "через",
    key_points: "Ключевые точки",
    step: "Шаг",
    street_undetermined: "улица не определена",
    empty_route: "Маршрут пуст (нет шагов)",
    meters: "м",
    kilometers: "км",
    decimal_separator: ',',
    hours: "ч",
    minutes: "мин",
    seconds: "с",
};

impl Default for Labels {
    fn default() -> Self {
        RUSSIAN
    }
}

impl Labels {
    /// Whole meters below 950 m, otherwise kilometers with one decimal.
    pub fn distance(&self, meters: f64) -> String {
        if meters < 950.0 {
            return format!("{} {}", meters.round() as i64, self.meters);
        }
        let km = format!("{:.1}", meters / 1000.0).replace('.', &self.decimal_separator.to_string());
        format!("{km} {}", self.kilometers)
    }

    /// Largest non-zero units: hours and minutes, hours, minutes, or seconds.
    pub fn duration(&self, seconds: f64) -> String {
        let total = seconds.round() as i64;
        let hours = total / 3600;
        let minutes = (total % 3600) / 60;
        match (hours, minutes) {
            (0, 0) => format!("{total} {}", self.seconds),
            (0, m) => format!("{m} {}", self.minutes),
            (h, 0) => format!("{h} {}", self.hours),
            (h, m) => format!("{h} {} {m} {}", self.hours, self.minutes),
        }
    }
}

/// Render the route document.
///
/// Steps are grouped into contiguous runs of equal locality, so a
/// settlement the route leaves and re-enters gets a second section.
pub fn build_markdown(
    a: &ResolvedPoint,
    b: &ResolvedPoint,
    steps: &[RouteStep],
    total_m: f64,
    total_s: f64,
    labels: &Labels,
) -> String {
    tracing::debug!(
        "building markdown: A=({}, {} {:?}) B=({}, {} {:?}) steps={}",
        a.coord.lat,
        a.coord.lon,
        a.label,
        b.coord.lat,
        b.coord.lon,
        b.label,
        steps.len()
    );

    let mut md: Vec<String> = Vec::new();
    md.push(format!("# {}\n", labels.title));
    md.push(format!(
        "**A:** {} ({:.6}, {:.6})  \n**B:** {} ({:.6}, {:.6})\n",
        a.label, a.coord.lat, a.coord.lon, b.label, b.coord.lat, b.coord.lon
    ));
    md.push(format!(
        "**{}:** {} • {}\n",
        labels.total,
        labels.distance(total_m),
        labels.duration(total_s)
    ));

    md.push(format!("## {}\n", labels.by_locality));
    for run in steps.chunk_by(|x, y| x.locality == y.locality) {
        let heading = run[0].locality.as_deref().unwrap_or(labels.between_localities);
        md.push(format!("### {heading}\n"));
        for step in run {
            md.push(format!(
                "- {} — **{}** — {} • {}  \n  {}: ({:.6}, {:.6})",
                step.instruction.as_deref().unwrap_or(""),
                step.street.as_deref().unwrap_or(labels.unnamed_street),
                labels.distance(step.distance_m as f64),
                labels.duration(step.duration_s as f64),
                labels.coordinates,
                step.start_lat,
                step.start_lon
            ));
            for via in step.via_localities.iter().flatten() {
                md.push(format!(
                    "  - {}: **{}** ({:.6}, {:.6})",
                    labels.via, via.name, via.lat, via.lon
                ));
            }
        }
        md.push(String::new());
    }

    md.push(format!("## {}\n", labels.key_points));
    for step in steps {
        md.push(format!(
            "- {} {}: ({:.6}, {:.6}) — {}",
            labels.step,
            step.idx + 1,
            step.start_lat,
            step.start_lon,
            step.street.as_deref().unwrap_or(labels.street_undetermined)
        ));
    }

    md.join("\n")
}
