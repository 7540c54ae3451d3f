// =============================================================================
// 国と都市のカタログ
// =============================================================================
//
// チェックポイントはこの固定カタログの都市にしか置けない。
// 5か国 × 5都市 = 25チェックポイント。

use crate::text_enum::text_enum;

text_enum! {
    /// チェックポイントを置ける国
    pub enum Country ("country") {
        France => "France",
        Italy => "Italy",
        Switzerland => "Switzerland",
        Spain => "Spain",
        Portugal => "Portugal",
    }
}

text_enum! {
    /// チェックポイントを置ける都市
    pub enum City ("city") {
        Paris => "Paris",
        Marseille => "Marseille",
        Perpignan => "Perpignan",
        Strasbourg => "Strasbourg",
        Lyon => "Lyon",
        Rome => "Rome",
        Florence => "Florence",
        Milan => "Milan",
        Como => "Como",
        Naples => "Naples",
        Geneva => "Geneva",
        Zurich => "Zurich",
        Bern => "Bern",
        Lausanne => "Lausanne",
        ChatelSaintDenis => "Chatel-Saint-Denis",
        Madrid => "Madrid",
        Barcelona => "Barcelona",
        Seville => "Seville",
        LloretDelMar => "Lloret del Mar",
        Malaga => "Malaga",
        Lisbon => "Lisbon",
        Porto => "Porto",
        Braga => "Braga",
        Leiria => "Leiria",
        Evora => "Evora",
    }
}

impl Country {
    /// その国の都市一覧（カタログ順）
    pub fn cities(&self) -> &'static [City] {
        use City::*;
        match self {
            Country::France => &[Paris, Marseille, Perpignan, Strasbourg, Lyon],
            Country::Italy => &[Rome, Florence, Milan, Como, Naples],
            Country::Switzerland => &[Geneva, Zurich, Bern, Lausanne, ChatelSaintDenis],
            Country::Spain => &[Madrid, Barcelona, Seville, LloretDelMar, Malaga],
            Country::Portugal => &[Lisbon, Porto, Braga, Leiria, Evora],
        }
    }
}

impl City {
    /// 都市が属する国
    pub fn country(&self) -> Country {
        use City::*;
        match self {
            Paris | Marseille | Perpignan | Strasbourg | Lyon => Country::France,
            Rome | Florence | Milan | Como | Naples => Country::Italy,
            Geneva | Zurich | Bern | Lausanne | ChatelSaintDenis => Country::Switzerland,
            Madrid | Barcelona | Seville | LloretDelMar | Malaga => Country::Spain,
            Lisbon | Porto | Braga | Leiria | Evora => Country::Portugal,
        }
    }
}

pub fn is_city_in_country(city: City, country: Country) -> bool {
    city.country() == country
}
