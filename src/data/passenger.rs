//! Passenger records supplied literally for prediction

use crate::error::{AutoMlError, Result};
use polars::prelude::*;
use serde::{Deserialize, Serialize};

/// One passenger, with the field names of the dataset header
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Passenger {
    pub passenger_id: i64,
    pub pclass: i64,
    pub name: String,
    pub sex: String,
    pub age: Option<f32>,
    #[serde(rename = "SibSp")]
    pub sib_sp: i64,
    pub parch: i64,
    pub ticket: String,
    pub fare: f32,
    pub cabin: String,
    pub embarked: String,
}

impl Passenger {
    /// Reject records the pipeline cannot score meaningfully
    pub fn validate(&self) -> Result<()> {
        let fail = |reason: String| AutoMlError::PredictionError {
            record_id: self.passenger_id,
            reason,
        };

        if !self.fare.is_finite() || self.fare < 0.0 {
            return Err(fail(format!("fare must be a non-negative number, got {}", self.fare)));
        }
        if let Some(age) = self.age {
            if !age.is_finite() || age < 0.0 {
                return Err(fail(format!("age must be a non-negative number, got {}", age)));
            }
        }
        if self.sib_sp < 0 || self.parch < 0 {
            return Err(fail("relative counts must be non-negative".to_string()));
        }
        if self.sex.trim().is_empty() {
            return Err(fail("sex is empty".to_string()));
        }
        Ok(())
    }
}

/// Build a frame with the dataset's header layout; empty strings become nulls
/// so literal records and loaded rows go through the same missing-value path.
pub fn passengers_to_frame(passengers: &[Passenger]) -> Result<DataFrame> {
    fn non_empty(s: &str) -> Option<&str> {
        if s.trim().is_empty() {
            None
        } else {
            Some(s)
        }
    }

    let ids: Vec<i64> = passengers.iter().map(|p| p.passenger_id).collect();
    let classes: Vec<i64> = passengers.iter().map(|p| p.pclass).collect();
    let names: Vec<Option<&str>> = passengers.iter().map(|p| non_empty(&p.name)).collect();
    let sexes: Vec<Option<&str>> = passengers.iter().map(|p| non_empty(&p.sex)).collect();
    let ages: Vec<Option<f64>> = passengers.iter().map(|p| p.age.map(f64::from)).collect();
    let sib_sp: Vec<i64> = passengers.iter().map(|p| p.sib_sp).collect();
    let parch: Vec<i64> = passengers.iter().map(|p| p.parch).collect();
    let tickets: Vec<Option<&str>> = passengers.iter().map(|p| non_empty(&p.ticket)).collect();
    let fares: Vec<f64> = passengers.iter().map(|p| f64::from(p.fare)).collect();
    let cabins: Vec<Option<&str>> = passengers.iter().map(|p| non_empty(&p.cabin)).collect();
    let embarked: Vec<Option<&str>> = passengers.iter().map(|p| non_empty(&p.embarked)).collect();

    let df = df!(
        "PassengerId" => ids,
        "Pclass" => classes,
        "Name" => names,
        "Sex" => sexes,
        "Age" => ages,
        "SibSp" => sib_sp,
        "Parch" => parch,
        "Ticket" => tickets,
        "Fare" => fares,
        "Cabin" => cabins,
        "Embarked" => embarked
    )?;
    Ok(df)
}

/// The three passengers scored at the end of every run
pub fn sample_passengers() -> Vec<Passenger> {
    vec![
        Passenger {
            passenger_id: 1,
            pclass: 3,
            name: "Braund, Mr. Owen Harris".to_string(),
            sex: "male".to_string(),
            age: Some(22.0),
            sib_sp: 1,
            parch: 0,
            ticket: "A/5 21171".to_string(),
            fare: 7.25,
            cabin: String::new(),
            embarked: "S".to_string(),
        },
        Passenger {
            passenger_id: 2,
            pclass: 1,
            name: "Cumings, Mrs. John Bradley (Florence Briggs Thayer)".to_string(),
            sex: "female".to_string(),
            age: Some(38.0),
            sib_sp: 1,
            parch: 0,
            ticket: "PC 17599".to_string(),
            fare: 71.2833,
            cabin: "C85".to_string(),
            embarked: "C".to_string(),
        },
        Passenger {
            passenger_id: 3,
            pclass: 3,
            name: "Heikkinen, Miss. Laina".to_string(),
            sex: "female".to_string(),
            age: Some(26.0),
            sib_sp: 0,
            parch: 0,
            ticket: "STON/O2. 3101282".to_string(),
            fare: 7.925,
            cabin: String::new(),
            embarked: "S".to_string(),
        },
    ]
}
