use crate::types::{BankType, FileClassification, VisitType};

/// Classify a file from its name.
///
/// The bank rule checks `bpi` before `bdo`; the visit rule (`ci` or
/// `collection`) is evaluated on its own, so both may fire.
pub fn auto_detect(filename: &str) -> FileClassification {
    let name = filename.to_lowercase();
    let bank_type = if name.contains("bpi") {
        BankType::Bpi
    } else if name.contains("bdo") {
        BankType::Bdo
    } else {
        BankType::Shared
    };
    let visit_type = if name.contains("ci") || name.contains("collection") {
        VisitType::Ci
    } else {
        VisitType::Shared
    };
    FileClassification { bank_type, visit_type }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bank_rules() {
        assert_eq!(auto_detect("BPI8AM.csv").bank_type, BankType::Bpi);
        assert_eq!(auto_detect("bdo_8am.csv").bank_type, BankType::Bdo);
        assert_eq!(auto_detect("DL8AM.csv").bank_type, BankType::Shared);
        assert_eq!(auto_detect("bpi_vs_bdo.csv").bank_type, BankType::Bpi);
    }

    #[test]
    fn visit_rules_are_independent() {
        let c = auto_detect("BDO_CI_Result.csv");
        assert_eq!(c, FileClassification { bank_type: BankType::Bdo, visit_type: VisitType::Ci });
        assert_eq!(auto_detect("Collection-June.csv").visit_type, VisitType::Ci);
        assert_eq!(auto_detect("BPI8AM.csv").visit_type, VisitType::Shared);
    }

    #[test]
    fn default_is_shared_shared() {
        assert_eq!(auto_detect("report.csv"), FileClassification::default());
    }
}
