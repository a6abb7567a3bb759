//! Typed spreadsheet row schema and the row-to-squad mapping.
//!
//! Headers are matched exactly (after trimming surrounding whitespace). A
//! renamed column does not fail the run: its field degrades to the default,
//! and the rename shows up in the run's unmapped/missing column lists.

use rand::Rng;

use super::coords::extract_coordinates;
use crate::models::{Squad, SquadEquipment, SquadMission, SquadSkills};

const COLUMN_COUNT: usize = 26;

/// Known columns of the squad registration sheet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Column {
    Dni,
    LeaderName,
    LeaderPhone,
    LodgingLocation,
    SquadName,
    MembersCount,
    InterventionZone,
    LocationLink,
    HasPpe,
    PpeDescription,
    HasTools,
    ToolsDescription,
    HasMachinery,
    MachineryDescription,
    HasWater,
    SkillOperational,
    SkillHealthSafety,
    SkillLogistics,
    SkillCommunications,
    SkillManagement,
    DepartureDay,
    DepartureTime,
    ReturnTime,
    HasReturned,
    CoordinationNotes,
    SubmittedAt,
}

impl Column {
    pub const ALL: [Column; COLUMN_COUNT] = [
        Column::Dni,
        Column::LeaderName,
        Column::LeaderPhone,
        Column::LodgingLocation,
        Column::SquadName,
        Column::MembersCount,
        Column::InterventionZone,
        Column::LocationLink,
        Column::HasPpe,
        Column::PpeDescription,
        Column::HasTools,
        Column::ToolsDescription,
        Column::HasMachinery,
        Column::MachineryDescription,
        Column::HasWater,
        Column::SkillOperational,
        Column::SkillHealthSafety,
        Column::SkillLogistics,
        Column::SkillCommunications,
        Column::SkillManagement,
        Column::DepartureDay,
        Column::DepartureTime,
        Column::ReturnTime,
        Column::HasReturned,
        Column::CoordinationNotes,
        Column::SubmittedAt,
    ];

    /// Header text as written in the registration form.
    pub fn header(&self) -> &'static str {
        match self {
            Column::Dni => "DNI",
            Column::LeaderName => "Nombre y apellido",
            Column::LeaderPhone => "Numero mobil",
            Column::LodgingLocation => "Localidad donde se quedan en comarca (Optional)",
            Column::SquadName => "Nombre de la cuadrilla (Optional)",
            Column::MembersCount => "Cuantos andan en su cuadrilla? 👷",
            Column::InterventionZone => "Zona de intervencion 📍",
            Column::LocationLink => {
                "Link de ubicacion Google Maps del lugar de intervencion 📍 (Optional)"
            }
            Column::HasPpe => "Lleva equipo de proteccion? \u{26D1}\u{FE0F}",
            Column::PpeDescription => "Que tipo de equipo de proteccion? \u{26D1}\u{FE0F} (Optional)",
            Column::HasTools => "Lleva insumos, accesorios y/o herramientas? \u{2692}\u{FE0F}",
            Column::ToolsDescription => {
                "Que tipo de insumos, accesorios y/o herramientas? \u{2692}\u{FE0F} (Optional)"
            }
            Column::HasMachinery => "Lleva maquinaria grande? 🚜",
            Column::MachineryDescription => "Que tipo de maquinaria? 🚜 (Optional)",
            Column::HasWater => "Lleva agua potable? 💧",
            Column::SkillOperational => "Competencias Operativas (Línea de Fuego)",
            Column::SkillHealthSafety => "Salud y Seguridad",
            Column::SkillLogistics => "Logística y Transporte",
            Column::SkillCommunications => "Técnica y Comunicaciones",
            Column::SkillManagement => "Gestión y Mando",
            Column::DepartureDay => "Dia de salida",
            Column::DepartureTime => "Hora de salida a terreno estimada",
            Column::ReturnTime => "Hora de regreso de terreno estimada",
            Column::HasReturned => "La cuadrilla regreso?",
            Column::CoordinationNotes => "Informarcion sobre la cuadrilla",
            Column::SubmittedAt => "Marca temporal",
        }
    }

    fn position(&self) -> usize {
        Column::ALL
            .iter()
            .position(|c| c == self)
            .unwrap_or_default()
    }

    fn from_header(header: &str) -> Option<Column> {
        Column::ALL.into_iter().find(|c| c.header() == header)
    }
}

/// One decoded sheet row; `None` means the cell was absent or blank.
#[derive(Debug, Clone, Default)]
pub struct SquadRow {
    cells: [Option<String>; COLUMN_COUNT],
}

impl SquadRow {
    pub fn get(&self, column: Column) -> Option<&str> {
        self.cells[column.position()].as_deref()
    }

    pub fn set(&mut self, column: Column, value: impl Into<String>) {
        let value = value.into();
        let trimmed = value.trim();
        self.cells[column.position()] = if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        };
    }

    fn text(&self, column: Column) -> String {
        self.get(column).unwrap_or_default().to_string()
    }

    fn flag(&self, column: Column) -> bool {
        self.get(column).is_some_and(is_affirmative)
    }
}

/// Header resolution for one sheet.
#[derive(Debug, Clone)]
pub struct SheetSchema {
    /// For each header cell, the column it feeds
    positions: Vec<Option<Column>>,
    unmapped: Vec<String>,
    missing: Vec<String>,
}

impl SheetSchema {
    pub fn from_headers<S: AsRef<str>>(headers: &[S]) -> Self {
        let mut positions = Vec::with_capacity(headers.len());
        let mut unmapped = Vec::new();

        for header in headers {
            let header = header.as_ref().trim();
            let column = Column::from_header(header);
            if column.is_none() && !header.is_empty() {
                unmapped.push(header.to_string());
            }
            positions.push(column);
        }

        let missing = Column::ALL
            .into_iter()
            .filter(|c| !positions.contains(&Some(*c)))
            .map(|c| c.header().to_string())
            .collect();

        Self {
            positions,
            unmapped,
            missing,
        }
    }

    /// Build a typed row from the cells of one data line.
    pub fn row<S: AsRef<str>>(&self, cells: &[S]) -> SquadRow {
        let mut row = SquadRow::default();
        for (column, cell) in self.positions.iter().zip(cells) {
            let Some(column) = column else {
                continue;
            };
            let cell = cell.as_ref();
            // Blank cells never clear a value from a repeated header.
            if !cell.trim().is_empty() {
                row.set(*column, cell);
            }
        }
        row
    }

    pub fn unmapped_columns(&self) -> &[String] {
        &self.unmapped
    }

    pub fn missing_columns(&self) -> &[String] {
        &self.missing
    }
}

/// Case-insensitive "yes" detection used by the form's yes/no answers.
pub fn is_affirmative(value: &str) -> bool {
    let lower = value.to_lowercase();
    lower.contains("si") || lower.contains("sí")
}

/// Parse the leading integer of a cell ("5 personas" is 5). Anything else is 0.
///
/// Oversized counts saturate at `u32::MAX`.
pub fn parse_count(value: &str) -> u32 {
    let digits: String = value
        .trim()
        .trim_start_matches('+')
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    if digits.is_empty() {
        return 0;
    }
    // Only overflow can fail on a non-empty run of ASCII digits.
    digits.parse().unwrap_or(u32::MAX)
}

/// Identifier for rows without a national ID.
///
/// Random, so re-ingesting such rows creates new records each run.
pub fn synthesize_id() -> String {
    format!("SQUAD-{}", rand::rng().random::<u32>())
}

/// Map one row into a complete squad record. Never fails.
pub fn map_row(row: &SquadRow, now: &str) -> Squad {
    let id = row
        .get(Column::Dni)
        .map(str::to_string)
        .unwrap_or_else(synthesize_id);

    let leader_name = row
        .get(Column::LeaderName)
        .unwrap_or("Sin Nombre")
        .to_string();

    let name = row.get(Column::SquadName).map(str::to_string).unwrap_or_else(|| {
        let leader = row.get(Column::LeaderName).unwrap_or(id.as_str());
        format!("Cuadrilla {}", leader)
    });

    let location_link = row.text(Column::LocationLink);
    let coords = extract_coordinates(&location_link);

    Squad {
        leader_name,
        leader_dni: id.clone(),
        leader_phone: row.text(Column::LeaderPhone),
        lodging_location: row.text(Column::LodgingLocation),
        name,
        members_count: row.get(Column::MembersCount).map(parse_count).unwrap_or(0),
        intervention_zone: row
            .get(Column::InterventionZone)
            .unwrap_or("Sin asignar")
            .to_string(),
        location_link,
        lat: coords.map(|c| c.lat),
        lng: coords.map(|c| c.lng),
        equipment: SquadEquipment {
            has_ppe: row.flag(Column::HasPpe),
            ppe_description: row.text(Column::PpeDescription),
            has_tools: row.flag(Column::HasTools),
            tools_description: row.text(Column::ToolsDescription),
            has_machinery: row.flag(Column::HasMachinery),
            machinery_description: row.text(Column::MachineryDescription),
            has_water: row.flag(Column::HasWater),
        },
        skills: SquadSkills {
            operational: row.text(Column::SkillOperational),
            health_safety: row.text(Column::SkillHealthSafety),
            logistics: row.text(Column::SkillLogistics),
            communications: row.text(Column::SkillCommunications),
            management: row.text(Column::SkillManagement),
        },
        mission: SquadMission {
            departure_day: row.text(Column::DepartureDay),
            departure_time: row.text(Column::DepartureTime),
            return_time: row.text(Column::ReturnTime),
            has_returned: row.flag(Column::HasReturned),
            coordination_notes: row.text(Column::CoordinationNotes),
            last_update: row
                .get(Column::SubmittedAt)
                .map(str::to_string)
                .unwrap_or_else(|| now.to_string()),
        },
        id,
    }
}
