//! Shared fixtures: a synthetic passenger file with the real dataset's header

#![allow(dead_code)]

use std::fmt::Write as _;
use std::path::PathBuf;
use tempfile::TempDir;

pub const HEADER: &str = "PassengerId,Survived,Pclass,Name,Sex,Age,SibSp,Parch,Ticket,Fare,Cabin,Embarked";

/// `n` passengers; survival is driven by sex and class so every trainer can learn it
pub fn passenger_csv(n: usize) -> String {
    let mut csv = String::from(HEADER);
    csv.push('\n');
    for i in 0..n {
        let id = i + 1;
        let pclass = 1 + (i * 7 % 3);
        let female = i % 5 == 1 || i % 5 == 3;
        let sex = if female { "female" } else { "male" };
        let title = match (female, i % 2) {
            (true, 0) => "Mrs.",
            (true, _) => "Miss.",
            (false, _) => "Mr.",
        };
        let age = if i % 9 == 4 { String::new() } else { format!("{}", 4 + (i * 13) % 60) };
        let fare = match pclass {
            1 => 60.0 + (i % 40) as f64,
            2 => 15.0 + (i % 10) as f64,
            _ => 7.0 + (i % 5) as f64 * 0.5,
        };
        let cabin = if pclass == 1 { format!("C{}", i % 12) } else { String::new() };
        let embarked = ["S", "C", "Q"][i % 3];
        let survived = u8::from(female || (pclass == 1 && i % 3 == 0));

        writeln!(
            csv,
            "{},{},{},\"Family{}, {} Given{}\",{},{},{},{},A/{} {},{:.2},{},{}",
            id,
            survived,
            pclass,
            i,
            title,
            i,
            sex,
            age,
            i % 3,
            i % 2,
            i % 7,
            1000 + i,
            fare,
            cabin,
            embarked
        )
        .unwrap();
    }
    csv
}

/// Write the synthetic file into a fresh temp dir; keep the dir alive while using the path
pub fn write_passenger_csv(n: usize) -> (TempDir, PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("train.csv");
    std::fs::write(&path, passenger_csv(n)).unwrap();
    (dir, path)
}
