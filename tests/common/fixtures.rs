//! Corpora used across harnesses.
//!
//! Every corpus is generated deterministically. Record rows are inserted in
//! the reverse of their natural sort order so that any test relying on the
//! store's natural order instead of the configured secondary sort fails.

use super::builders::{record, CorpusBuilder, DocBuilder};
use serde_json::json;

pub const BAG_INDEX: &str = "ds_index";
pub const BAG_MODEL: &str = "nummeraanduiding";
pub const HR_MODEL: &str = "vestiging";

/// Id of the `i`-th address in borough `stadsdeel`.
pub fn address_id(stadsdeel: &str, i: usize) -> String {
    format!("0363{stadsdeel}{i:012}")
}

/// Add `n` addresses on the Dam (borough A) or Plein '40-'45 (any other
/// borough), house numbers `1..=n`.
pub fn with_addresses(mut corpus: CorpusBuilder, stadsdeel: &str, n: usize) -> CorpusBuilder {
    let street = if stadsdeel == "A" { "Dam" } else { "Plein '40-'45" };
    for i in (0..n).rev() {
        let id = address_id(stadsdeel, i);
        let number = i as i64 + 1;
        let hit = DocBuilder::new(&id)
            .field("dataset", "bag")
            .field("naam", street)
            .field("_openbare_ruimte_naam", street)
            .field("huisnummer", number)
            .field("postcode", "1012JS")
            .field("woonplaats", "Amsterdam")
            .field("stadsdeel_code", stadsdeel)
            .field("stadsdeel_naam", if stadsdeel == "A" { "Centrum" } else { "Nieuw-West" })
            .field("centroid", json!([4.8932, 52.3731]))
            .build();
        let row = record(
            &id,
            &[
                ("_openbare_ruimte_naam", json!(street)),
                ("huisnummer", json!(number)),
                ("huisletter", json!(null)),
                ("huisnummer_toevoeging", json!(null)),
                ("postcode", json!("1012JS")),
                ("woonplaats", json!("Amsterdam")),
                ("stadsdeel_code", json!(stadsdeel)),
                ("begin_geldigheid", json!("2010-06-01")),
            ],
        );
        corpus = corpus.pair(BAG_INDEX, BAG_MODEL, hit, row);
    }
    corpus
}

/// Three establishments with nested SBI classifications:
///
/// | id | sbi codes (hoofdcategorie)                          |
/// |----|-----------------------------------------------------|
/// | v1 | 1071 (handel, vervoer, opslag)                      |
/// | v2 | 5630 (horeca), 5610 (horeca)                        |
/// | v3 | 4711 (handel, vervoer, opslag), 5610 (horeca)       |
pub fn with_establishments(corpus: CorpusBuilder) -> CorpusBuilder {
    let sbi = |code: &str, hoofd: &str, sub: &str| {
        json!({ "sbi_code": code, "hoofdcategorie": hoofd, "subcategorie": sub })
    };
    let entries = [
        ("v1", "Bakkerij De Dam", "handel, vervoer, opslag", vec![sbi("1071", "handel, vervoer, opslag", "detailhandel")]),
        ("v2", "Café Damrak", "horeca", vec![sbi("5630", "horeca", "cafe"), sbi("5610", "horeca", "restaurant")]),
        (
            "v3",
            "Mixed BV",
            "handel, vervoer, opslag",
            vec![sbi("4711", "handel, vervoer, opslag", "supermarkt"), sbi("5610", "horeca", "restaurant")],
        ),
    ];

    let mut corpus = corpus;
    for (id, name, hoofd, codes) in entries.into_iter().rev() {
        let hit = DocBuilder::new(id)
            .field("dataset", "hr")
            .field("handelsnaam", name)
            .field("hoofdcategorie", hoofd)
            .field("subcategorie", "")
            .field("postcode", "1012JS")
            .field("stadsdeel_code", "A")
            .nested("sbi_codes", codes)
            .build();
        let row = record(
            id,
            &[
                ("kvk_nummer", json!(format!("33{id}"))),
                // The record store lags behind the index; the index wins.
                ("handelsnaam", json!(name.to_uppercase())),
                ("postcode", json!("1012JS")),
                ("datum_aanvang", json!("1998-04-01")),
                ("non_mailing", json!(false)),
            ],
        );
        corpus = corpus.pair(BAG_INDEX, HR_MODEL, hit, row);
    }
    corpus
}
