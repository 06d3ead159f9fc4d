use crate::places::PlaceDetail;

/// Constant written to the "Fuente" column.
pub const SOURCE_LABEL: &str = "Google Maps API";

/// Column order is the export contract; both the per-locality sheets and the
/// consolidated report use it verbatim.
pub const COLUMNS: [&str; 16] = [
    "Nombre",
    "Dirección",
    "Provincia",
    "Localidad",
    "Teléfono",
    "Teléfono Internacional",
    "WhatsApp",
    "Correo electrónico",
    "Sitio web",
    "Calificación",
    "Tipos de negocio",
    "Servicios ofrecidos",
    "Término de búsqueda",
    "Fuente",
    "URL",
    "Fecha de extracción",
];

/// One persisted business record. Region, locality and term always come from
/// the caller, never from the API. WhatsApp and email are kept as explicit
/// always-empty columns: the API provides neither, but the column order
/// matters downstream.
#[derive(Debug, Clone)]
pub struct OutputRow {
    pub name: String,
    pub address: String,
    pub region: String,
    pub locality: String,
    pub phone: String,
    pub international_phone: String,
    pub whatsapp: String,
    pub email: String,
    pub website: String,
    pub rating: String,
    pub business_types: String,
    pub services_offered: String,
    pub search_term: String,
    pub source: String,
    pub url: String,
    pub extracted_at: String,
}

impl OutputRow {
    pub fn from_detail(
        detail: &PlaceDetail,
        region: &str,
        locality: &str,
        term: &str,
        extracted_at: &str,
    ) -> Option<Self> {
        if detail.is_empty() {
            return None;
        }

        Some(Self {
            name: detail.name.clone().unwrap_or_default(),
            address: detail.formatted_address.clone().unwrap_or_default(),
            region: region.to_string(),
            locality: locality.to_string(),
            phone: detail.formatted_phone_number.clone().unwrap_or_default(),
            international_phone: detail
                .international_phone_number
                .clone()
                .unwrap_or_default(),
            whatsapp: String::new(),
            email: String::new(),
            website: detail.website.clone().unwrap_or_default(),
            rating: detail.rating.map(format_rating).unwrap_or_default(),
            business_types: detail.types.join(", "),
            services_offered: term.to_string(),
            search_term: term.to_string(),
            source: SOURCE_LABEL.to_string(),
            url: canonical_url(detail),
            extracted_at: extracted_at.to_string(),
        })
    }

    /// Field values in canonical column order.
    pub fn values(&self) -> [&str; 16] {
        [
            &self.name,
            &self.address,
            &self.region,
            &self.locality,
            &self.phone,
            &self.international_phone,
            &self.whatsapp,
            &self.email,
            &self.website,
            &self.rating,
            &self.business_types,
            &self.services_offered,
            &self.search_term,
            &self.source,
            &self.url,
            &self.extracted_at,
        ]
    }
}

/// API-provided URL wins; otherwise a canonical maps URL is synthesized from
/// the place id; otherwise empty.
fn canonical_url(detail: &PlaceDetail) -> String {
    if let Some(url) = &detail.url {
        return url.clone();
    }
    match &detail.place_id {
        Some(id) => format!("https://maps.google.com/?cid={id}"),
        None => String::new(),
    }
}

fn format_rating(rating: f64) -> String {
    // 4.0 prints as "4", 4.5 as "4.5"; same as the upstream JSON number.
    format!("{rating}")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_detail() -> PlaceDetail {
        PlaceDetail {
            name: Some("Notebooks del Sur".into()),
            formatted_address: Some("Defensa 900, CABA".into()),
            formatted_phone_number: Some("011 4300-1234".into()),
            international_phone_number: Some("+54 11 4300-1234".into()),
            website: Some("https://notebooksdelsur.example".into()),
            rating: Some(4.5),
            url: Some("https://maps.google.com/?cid=123".into()),
            place_id: Some("id-123".into()),
            types: vec!["electronics_store".into(), "store".into()],
        }
    }

    fn format(detail: &PlaceDetail) -> Option<OutputRow> {
        OutputRow::from_detail(
            detail,
            "Ciudad Autónoma de Buenos Aires",
            "San Telmo",
            "reparación de notebooks",
            "2025-01-15 10:30:00",
        )
    }

    #[test]
    fn empty_detail_yields_no_row() {
        assert!(format(&PlaceDetail::default()).is_none());
    }

    #[test]
    fn whatsapp_and_email_are_always_empty() {
        let row = format(&sample_detail()).unwrap();
        assert_eq!(row.whatsapp, "");
        assert_eq!(row.email, "");
    }

    #[test]
    fn api_url_wins_over_synthesized_one() {
        let row = format(&sample_detail()).unwrap();
        assert_eq!(row.url, "https://maps.google.com/?cid=123");
    }

    #[test]
    fn url_is_synthesized_from_place_id_when_absent() {
        let detail = PlaceDetail {
            url: None,
            ..sample_detail()
        };
        let row = format(&detail).unwrap();
        assert_eq!(row.url, "https://maps.google.com/?cid=id-123");
    }

    #[test]
    fn url_is_empty_without_url_or_place_id() {
        let detail = PlaceDetail {
            url: None,
            place_id: None,
            ..sample_detail()
        };
        let row = format(&detail).unwrap();
        assert_eq!(row.url, "");
    }

    #[test]
    fn caller_context_fills_region_locality_and_term() {
        let row = format(&sample_detail()).unwrap();
        assert_eq!(row.region, "Ciudad Autónoma de Buenos Aires");
        assert_eq!(row.locality, "San Telmo");
        assert_eq!(row.search_term, "reparación de notebooks");
        assert_eq!(row.services_offered, row.search_term);
        assert_eq!(row.source, SOURCE_LABEL);
    }

    #[test]
    fn types_join_with_comma_space_and_rating_keeps_json_shape() {
        let row = format(&sample_detail()).unwrap();
        assert_eq!(row.business_types, "electronics_store, store");
        assert_eq!(row.rating, "4.5");

        let integral = PlaceDetail {
            rating: Some(4.0),
            ..sample_detail()
        };
        assert_eq!(format(&integral).unwrap().rating, "4");
    }

    #[test]
    fn values_follow_canonical_column_order() {
        let row = format(&sample_detail()).unwrap();
        let values = row.values();
        assert_eq!(values.len(), COLUMNS.len());
        assert_eq!(values[0], row.name);
        assert_eq!(values[14], row.url);
        assert_eq!(values[15], row.extracted_at);
    }
}
