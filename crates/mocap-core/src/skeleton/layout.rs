use serde::{Deserialize, Serialize};

/// Body landmarks in upstream pose-estimator order.
const BODY_KEYPOINTS: [&str; 33] = [
    "nose",
    "left_eye_inner",
    "left_eye",
    "left_eye_outer",
    "right_eye_inner",
    "right_eye",
    "right_eye_outer",
    "left_ear",
    "right_ear",
    "mouth_left",
    "mouth_right",
    "left_shoulder",
    "right_shoulder",
    "left_elbow",
    "right_elbow",
    "left_wrist",
    "right_wrist",
    "left_pinky",
    "right_pinky",
    "left_index",
    "right_index",
    "left_thumb",
    "right_thumb",
    "left_hip",
    "right_hip",
    "left_knee",
    "right_knee",
    "left_ankle",
    "right_ankle",
    "left_heel",
    "right_heel",
    "left_foot_index",
    "right_foot_index",
];

/// Hand landmarks, prefixed with `left_hand_` / `right_hand_` in the hand layout.
const HAND_KEYPOINTS: [&str; 21] = [
    "wrist",
    "thumb_cmc",
    "thumb_mcp",
    "thumb_ip",
    "thumb_tip",
    "index_finger_mcp",
    "index_finger_pip",
    "index_finger_dip",
    "index_finger_tip",
    "middle_finger_mcp",
    "middle_finger_pip",
    "middle_finger_dip",
    "middle_finger_tip",
    "ring_finger_mcp",
    "ring_finger_pip",
    "ring_finger_dip",
    "ring_finger_tip",
    "pinky_mcp",
    "pinky_pip",
    "pinky_dip",
    "pinky_tip",
];

/// `(a, b)` pairs compared as `kpt[a] - kpt[b]`, shared by both layouts.
const BODY_CONNECTIONS: [(&str, &str); 23] = [
    // torso
    ("right_shoulder", "left_shoulder"),
    ("right_hip", "left_hip"),
    ("left_shoulder", "left_hip"),
    ("right_shoulder", "right_hip"),
    // head
    ("right_ear", "left_ear"),
    ("nose", "left_ear"),
    ("nose", "right_ear"),
    ("nose", "left_shoulder"),
    ("nose", "right_shoulder"),
    // arms
    ("left_elbow", "left_shoulder"),
    ("left_wrist", "left_elbow"),
    ("right_elbow", "right_shoulder"),
    ("right_wrist", "right_elbow"),
    // legs
    ("left_knee", "left_hip"),
    ("left_ankle", "left_knee"),
    ("right_knee", "right_hip"),
    ("right_ankle", "right_knee"),
    ("left_heel", "left_ankle"),
    ("left_foot_index", "left_ankle"),
    ("left_foot_index", "left_heel"),
    ("right_heel", "right_ankle"),
    ("right_foot_index", "right_ankle"),
    ("right_foot_index", "right_heel"),
];

/// Coarse hand landmarks of the body model, used only without hand tracking.
const BODY_HAND_CONNECTIONS: [(&str, &str); 6] = [
    ("left_index", "left_wrist"),
    ("left_pinky", "left_wrist"),
    ("left_thumb", "left_wrist"),
    ("right_index", "right_wrist"),
    ("right_pinky", "right_wrist"),
    ("right_thumb", "right_wrist"),
];

/// Finger chains as `(child, parent)` suffixes within one hand.
const HAND_CONNECTIONS: [(&str, &str); 20] = [
    ("thumb_cmc", "wrist"),
    ("thumb_mcp", "thumb_cmc"),
    ("thumb_ip", "thumb_mcp"),
    ("thumb_tip", "thumb_ip"),
    ("index_finger_mcp", "wrist"),
    ("index_finger_pip", "index_finger_mcp"),
    ("index_finger_dip", "index_finger_pip"),
    ("index_finger_tip", "index_finger_dip"),
    ("middle_finger_mcp", "wrist"),
    ("middle_finger_pip", "middle_finger_mcp"),
    ("middle_finger_dip", "middle_finger_pip"),
    ("middle_finger_tip", "middle_finger_dip"),
    ("ring_finger_mcp", "wrist"),
    ("ring_finger_pip", "ring_finger_mcp"),
    ("ring_finger_dip", "ring_finger_pip"),
    ("ring_finger_tip", "ring_finger_dip"),
    ("pinky_mcp", "wrist"),
    ("pinky_pip", "pinky_mcp"),
    ("pinky_dip", "pinky_pip"),
    ("pinky_tip", "pinky_dip"),
];

/// Keypoint pairs whose rest length is stable enough to estimate body scale.
const SCALE_PAIRS: [(&str, &str); 4] = [
    ("left_shoulder", "right_shoulder"),
    ("left_hip", "right_hip"),
    ("left_shoulder", "left_hip"),
    ("right_shoulder", "right_hip"),
];

/// Keypoints whose centroid anchors the root translation.
const ALIGNMENT_KEYPOINTS: [&str; 4] = ["left_hip", "right_hip", "left_shoulder", "right_shoulder"];

/// Keypoint set produced by the upstream pose estimator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeypointLayout {
    /// 33 body landmarks.
    #[default]
    Body,
    /// 33 body landmarks followed by 21 left-hand and 21 right-hand landmarks.
    BodyWithHands,
}

impl KeypointLayout {
    pub fn from_track_hands(track_hands: bool) -> Self {
        if track_hands {
            Self::BodyWithHands
        } else {
            Self::Body
        }
    }

    pub fn tracks_hands(self) -> bool {
        self == Self::BodyWithHands
    }

    /// Number of keypoints `K` expected per frame.
    pub fn num_keypoints(self) -> usize {
        match self {
            Self::Body => BODY_KEYPOINTS.len(),
            Self::BodyWithHands => BODY_KEYPOINTS.len() + 2 * HAND_KEYPOINTS.len(),
        }
    }

    /// Keypoint names in array order.
    pub fn names(self) -> Vec<String> {
        let mut names: Vec<String> = BODY_KEYPOINTS.iter().map(|s| s.to_string()).collect();
        if self.tracks_hands() {
            for side in ["left", "right"] {
                names.extend(HAND_KEYPOINTS.iter().map(|s| format!("{side}_hand_{s}")));
            }
        }
        names
    }

    pub fn index_of(self, name: &str) -> Option<usize> {
        if let Some(i) = BODY_KEYPOINTS.iter().position(|k| *k == name) {
            return Some(i);
        }
        if !self.tracks_hands() {
            return None;
        }
        let (offset, suffix) = if let Some(s) = name.strip_prefix("left_hand_") {
            (BODY_KEYPOINTS.len(), s)
        } else if let Some(s) = name.strip_prefix("right_hand_") {
            (BODY_KEYPOINTS.len() + HAND_KEYPOINTS.len(), s)
        } else {
            return None;
        };
        HAND_KEYPOINTS
            .iter()
            .position(|k| *k == suffix)
            .map(|i| offset + i)
    }

    /// Direction pairs `(a, b)` compared as `kpt[a] - kpt[b]`.
    pub fn connections(self) -> Vec<(String, String)> {
        let mut pairs: Vec<(String, String)> = BODY_CONNECTIONS
            .iter()
            .map(|(a, b)| (a.to_string(), b.to_string()))
            .collect();
        if self.tracks_hands() {
            for side in ["left", "right"] {
                pairs.extend(
                    HAND_CONNECTIONS
                        .iter()
                        .map(|(a, b)| (format!("{side}_hand_{a}"), format!("{side}_hand_{b}"))),
                );
            }
        } else {
            pairs.extend(
                BODY_HAND_CONNECTIONS
                    .iter()
                    .map(|(a, b)| (a.to_string(), b.to_string())),
            );
        }
        pairs
    }

    pub fn scale_pairs(self) -> &'static [(&'static str, &'static str)] {
        &SCALE_PAIRS
    }

    pub fn alignment_keypoints(self) -> &'static [&'static str] {
        &ALIGNMENT_KEYPOINTS
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_sizes() {
        assert_eq!(KeypointLayout::Body.num_keypoints(), 33);
        assert_eq!(KeypointLayout::BodyWithHands.num_keypoints(), 75);
        assert_eq!(KeypointLayout::BodyWithHands.names().len(), 75);
    }

    #[test]
    fn names_and_indices_agree() {
        for layout in [KeypointLayout::Body, KeypointLayout::BodyWithHands] {
            for (i, name) in layout.names().iter().enumerate() {
                assert_eq!(layout.index_of(name), Some(i), "{name} in {layout:?}");
            }
        }
        assert_eq!(KeypointLayout::Body.index_of("left_hand_wrist"), None);
        assert_eq!(
            KeypointLayout::BodyWithHands.index_of("right_hand_pinky_tip"),
            Some(74)
        );
    }

    #[test]
    fn every_connection_names_a_layout_keypoint() {
        for layout in [KeypointLayout::Body, KeypointLayout::BodyWithHands] {
            for (a, b) in layout.connections() {
                assert!(layout.index_of(&a).is_some(), "{a} missing from {layout:?}");
                assert!(layout.index_of(&b).is_some(), "{b} missing from {layout:?}");
            }
        }
    }
}
