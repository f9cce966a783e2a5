use qualify::{Context, EligibilityEngine, RulePackage};
use tracing_subscriber::EnvFilter;

const FEDERAL: &str = r#"{
    "name": "federal",
    "jurisdiction": "US",
    "version": "2024.1",
    "programs": [
        {"id": "snap", "name": "Supplemental Nutrition Assistance Program", "category": "food"},
        {"id": "wic", "name": "Women, Infants, and Children", "category": "food"},
        {"id": "ssi", "name": "Supplemental Security Income", "category": "cash"}
    ],
    "rules": [
        {"id": "snap-gross-income", "programId": "snap",
         "explanation": "Gross monthly income at or below 130% of poverty",
         "expression": {"<=": [{"var": "householdIncome"}, 2694]},
         "requiredDocuments": [{"id": "pay-stubs", "name": "Last 30 days of pay stubs"}]},
        {"id": "snap-household-size", "programId": "snap",
         "explanation": "At least one household member",
         "expression": {">=": [{"var": "householdSize"}, 1]}},
        {"id": "snap-citizenship", "programId": "snap",
         "explanation": "Citizen or qualified non-citizen",
         "expression": {"in": [{"var": "citizenship"}, ["citizen", "permanent_resident"]]}},

        {"id": "wic-pregnant-or-child", "programId": "wic",
         "explanation": "Pregnant, or has a child under 5",
         "expression": {"or": [{"var": "isPregnant"}, {"var": "hasChildUnder5"}]},
         "nextSteps": [{"text": "Contact your local WIC clinic"}]},
        {"id": "wic-income-eligibility", "programId": "wic",
         "explanation": "Income at or below 185% of poverty",
         "expression": {"<=": [{"var": "householdIncome"}, 3833]}},

        {"id": "ssi-age", "programId": "ssi",
         "explanation": "Aged 65 or older",
         "expression": {">=": [{"age_from_dob": [{"var": "dateOfBirth"}]}, 65]}},
        {"id": "ssi-assets", "programId": "ssi",
         "explanation": "Countable resources at or below $2,000",
         "expression": {"<=": [{"var": "assets"}, 2000]}}
    ]
}"#;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("qualify=info")),
        )
        .init();

    let engine = EligibilityEngine::default().with_package(RulePackage::from_json(FEDERAL)?)?;
    println!("programs: {}", engine.programs().join(", "));

    let households = [
        (
            "young family",
            serde_json::json!({
                "householdIncome": 2100,
                "householdSize": 3,
                "citizenship": "citizen",
                "isPregnant": false,
                "hasChildUnder5": true,
                "dateOfBirth": "1994-08-02"
            }),
        ),
        (
            "retired single",
            serde_json::json!({
                "householdIncome": 3100,
                "householdSize": 1,
                "citizenship": "permanent_resident",
                "dateOfBirth": "1955-01-20"
            }),
        ),
    ];

    for (label, profile) in households {
        let ctx = Context::from_json(&profile)?;
        let results = engine.evaluate(&ctx);

        println!("\n== {label} ==");
        for (bucket, verdict) in results.iter() {
            println!("[{bucket:?}] {verdict}");
            println!("    {}", verdict.reason);
            for line in &verdict.details {
                println!("    {line}");
            }
            for calc in &verdict.calculations {
                println!("    {}: {}", calc.label, calc.comparison);
            }
            if verdict.incomplete_profile {
                println!("    still needed: {}", verdict.missing_fields.join(", "));
            }
        }

        let partition = results.into_partition();
        println!(
            "{} qualified, {} maybe, {} not qualified",
            partition.qualified.len(),
            partition.maybe.len(),
            partition.not_qualified.len()
        );
    }

    Ok(())
}
