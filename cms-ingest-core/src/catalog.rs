//! Category catalog: which files to fetch for each dataset category.
//!
//! A [`Catalog`] is an ordered mapping from category name to the ordered list of
//! locators fetched for it. It is built once at startup and never changes during
//! a run. Construction enforces that every category has at least one locator and
//! that every locator is an absolute URL; an empty catalog is allowed.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;
use url::Url;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("category {0:?} has no locators")]
    EmptyCategory(String),

    #[error("category {0:?} is declared more than once")]
    DuplicateCategory(String),

    #[error("category name must not be empty")]
    EmptyCategoryName,

    #[error("locator {locator:?} in category {category:?} is not a valid URL: {source}")]
    InvalidLocator {
        category: String,
        locator: String,
        #[source]
        source: url::ParseError,
    },
}

/// One category as written in a catalog file: a name plus its locators.
///
/// Locators may be absolute URLs or paths relative to the configured base URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategorySpec {
    pub name: String,
    #[serde(default)]
    pub locators: Vec<String>,
}

/// Root of a YAML catalog file.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CatalogFile {
    #[serde(default)]
    pub categories: Vec<CategorySpec>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Catalog {
    categories: IndexMap<String, Vec<Url>>,
}

impl Catalog {
    pub fn new<I>(categories: I) -> Result<Self, CatalogError>
    where
        I: IntoIterator<Item = (String, Vec<Url>)>,
    {
        let mut map = IndexMap::new();
        for (name, locators) in categories {
            if name.trim().is_empty() {
                return Err(CatalogError::EmptyCategoryName);
            }
            if locators.is_empty() {
                return Err(CatalogError::EmptyCategory(name));
            }
            if map.contains_key(&name) {
                return Err(CatalogError::DuplicateCategory(name));
            }
            map.insert(name, locators);
        }
        Ok(Self { categories: map })
    }

    /// Resolve category specs against `base_url` and validate the result.
    pub fn from_specs(base_url: &str, specs: &[CategorySpec]) -> Result<Self, CatalogError> {
        let mut resolved = Vec::with_capacity(specs.len());
        for spec in specs {
            let locators = spec
                .locators
                .iter()
                .map(|raw| resolve_locator(base_url, &spec.name, raw))
                .collect::<Result<Vec<_>, _>>()?;
            resolved.push((spec.name.clone(), locators));
        }
        let catalog = Self::new(resolved)?;
        debug!(categories = catalog.len(), "Catalog resolved");
        Ok(catalog)
    }

    /// The CMS provider-data catalog, resolved against `base_url`
    /// (e.g. `https://data.cms.gov/provider-data/sites/default/files`).
    pub fn cms_provider(base_url: &str) -> Result<Self, CatalogError> {
        Self::from_specs(base_url, &cms_provider_specs())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[Url])> {
        self.categories
            .iter()
            .map(|(name, locators)| (name.as_str(), locators.as_slice()))
    }

    pub fn categories(&self) -> impl Iterator<Item = &str> {
        self.categories.keys().map(String::as_str)
    }

    pub fn locators(&self, category: &str) -> Option<&[Url]> {
        self.categories.get(category).map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.categories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }

    /// Fully resolved form, suitable for writing back out as a catalog file.
    pub fn to_file(&self) -> CatalogFile {
        CatalogFile {
            categories: self
                .iter()
                .map(|(name, locators)| CategorySpec {
                    name: name.to_string(),
                    locators: locators.iter().map(Url::to_string).collect(),
                })
                .collect(),
        }
    }
}

/// Locators that parse as absolute URLs are taken as is; anything else is appended to `base_url`.
pub fn resolve_locator(base_url: &str, category: &str, raw: &str) -> Result<Url, CatalogError> {
    let raw = raw.trim();
    let resolved = match Url::parse(raw) {
        Err(url::ParseError::RelativeUrlWithoutBase) => Url::parse(&format!(
            "{}/{}",
            base_url.trim_end_matches('/'),
            raw.trim_start_matches('/')
        )),
        parsed => parsed,
    };
    resolved.map_err(|source| CatalogError::InvalidLocator {
        category: category.to_string(),
        locator: raw.to_string(),
        source,
    })
}

fn spec(name: &str, locators: &[&str]) -> CategorySpec {
    CategorySpec {
        name: name.to_string(),
        locators: locators.iter().map(|l| l.to_string()).collect(),
    }
}

fn cms_provider_specs() -> Vec<CategorySpec> {
    vec![
        spec(
            "dialysis-facilities",
            &[
                "archive/Dialysis%20facilities/current/dialysis_facilities_current_data.zip",
                "data_dictionaries/dialysis/DF_Data_Dictionary.pdf",
            ],
        ),
        spec(
            "doctors-and-clinicians",
            &[
                "archive/Doctors%20and%20clinicians/current/doctors_and_clinicians_current_data.zip",
                "data_dictionaries/physician/DOC_Data_Dictionary.pdf",
            ],
        ),
        spec(
            "home-health-service",
            &[
                "archive/Home%20health%20services/current/home_health_services_current_data.zip",
                "data_dictionaries/home_health/HHS_Data_Dictionary.pdf",
            ],
        ),
        spec(
            "hospice-care",
            &[
                "archive/Hospice%20care/current/hospice_care_current_data.zip",
                "data_dictionaries/hospice/HOSPICE_Data_Dictionary.pdf",
            ],
        ),
        spec(
            "hospital-data",
            &[
                "archive/Hospitals/current/hospitals_current_data.zip",
                "data_dictionaries/hospital/HospitalCompare-DataDictionary.pdf",
            ],
        ),
        spec(
            "inpatient-rehabilitation-facilities",
            &[
                "archive/Inpatient%20rehabilitation%20facilities/current/inpatient_rehabilitation_facilities_current_data.zip",
                "data_dictionaries/inpatient/IRF-Data-Dictionary.pdf",
            ],
        ),
        spec(
            "long-term-care-hospitals",
            &[
                "archive/Long-term%20care%20hospitals/current/long-term_care_hospitals_current_data.zip",
                "data_dictionaries/long_term_care_hospital/LTCH-Data-Dictionary.pdf",
            ],
        ),
        spec(
            "nursing-homes-including-rehab-services",
            &[
                "archive/Nursing%20homes%20including%20rehab%20services/current/nursing_homes_including_rehab_services_current_data.zip",
                "data_dictionaries/nursing_home/NH_SNFQRP_Data_Dictionary.pdf",
                "data_dictionaries/nursing_home/NH_SNFVBP_Data_Dictionary.xlsx",
                "data_dictionaries/nursing_home/NH_Primary_Data_Dictionary.xlsx",
            ],
        ),
        spec(
            "supplier-directory",
            &[
                "archive/Supplier%20directory/current/supplier_directory_current_data.zip",
                "data_dictionaries/supplier/Supplier_Directory_Data_Dictionary.pdf",
            ],
        ),
    ]
}
